//! テスト用のユーティリティ群。
