//! コントローラのピアグループ(Mongo互換のレプリカセット)の
//! メンバ構成を望ましい状態へ収束させるためのクレート.
//!
//! 中核となるのは、現在のメンバ群・ステータス群・候補マシン群から
//! 次のメンバ構成を計算する純粋な調停処理(`desired::desired_peer_group`)であり、
//! その周囲を`PeerGrouper`ワーカーが制御ループとして包んでいる.
//!
//! このクレート自体は、アルゴリズム実装のみに専念しており、
//! 実際に動作するシステムで利用するためには、`Io`トレイトの
//! 実装を別個用意する必要がある.
#![warn(missing_docs)]
extern crate futures;
extern crate prometrics;
#[macro_use]
extern crate trackable;

pub use crate::error::{Error, ErrorKind};
pub use crate::io::{Change, Io, TimeoutKind};
pub use crate::worker::{Event, PeerGrouper};

pub mod address;
pub mod desired;
pub mod machine;
pub mod member;
pub mod metrics;

mod error;
mod io;
mod test_util;
mod worker;

/// クレート固有の`Result`型.
pub type Result<T> = ::std::result::Result<T, Error>;
