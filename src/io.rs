use futures::Future;

use crate::machine::Machine;
use crate::member::{Member, MemberStatus};
use crate::{Error, Result};

/// コントローラ側の状態変更の通知.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// マシン群(候補集合やアドレス)が変化した.
    Machines,

    /// レプリカセット側の状態が変化した可能性がある.
    ReplicaSet,
}

/// タイムアウトの種別.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// 定期的な調停周期用のタイムアウト.
    Interval,

    /// エラー後の再試行を遅らせるためのタイムアウト.
    Backoff,
}

/// ピアグループの調停に必要なI/O機能を提供するためのトレイト.
///
/// 機能としてはおおまかに以下の三つに区分される:
///
/// - **レプリカセットドライバ**
///   - 現在のメンバ群・ステータス群の取得と、メンバ構成の再構成
///   - 再構成の実行はレプリカセット層で直列化されている必要がある
///     (複数の再構成を並行して走らせてはならない)
/// - **コントローラ状態**
///   - 候補マシン群の取得と、状態変更の通知
/// - **タイマー**
///   - 調停周期およびエラー後のバックオフの管理用タイマー
pub trait Io {
    /// 各メンバのステータス群を取得するための`Future`.
    type CurrentStatuses: Future<Item = Vec<MemberStatus>, Error = Error>;

    /// 現在のメンバ群を取得するための`Future`.
    type CurrentMembers: Future<Item = Vec<Member>, Error = Error>;

    /// コントローラが管理するマシン群を取得するための`Future`.
    type CandidateMachines: Future<Item = Vec<Machine>, Error = Error>;

    /// メンバ構成の再構成を実行するための`Future`.
    type Reconfigure: Future<Item = (), Error = Error>;

    /// タイムアウトを表現するための`Future`.
    type Timeout: Future<Item = (), Error = Error>;

    /// コントローラ側の状態変更の通知の受信を試みる.
    ///
    /// 通知のチャンネルの信頼性はある程度低くても良い.
    /// 複数の変更が一つの通知にまとめられたり、重複したり、
    /// 欠落したりすることは許容される
    /// (欠落は定期的な調停周期によって補われる).
    ///
    /// # 注意
    ///
    /// このメソッドが`Err`を返した場合には、調停ワーカー自体が
    /// 停止してしまうので、時間経過によって自動的には回復しない
    /// 致命的なものを除いては、`Err`は返さないことが望ましい.
    fn try_recv_change(&mut self) -> Result<Option<Change>>;

    /// レプリカセットから、各メンバの現在のステータス群を取得する.
    fn current_statuses(&mut self) -> Self::CurrentStatuses;

    /// レプリカセットの現在のメンバ群を取得する.
    ///
    /// 可能であれば、`current_statuses`メソッドと同一のセッション呼び出しに
    /// 由来する一貫したスナップショットを返すことが望ましい.
    /// そうでない場合でも安全性は損なわれないが、構成の収束に
    /// 余分な周期を要することがある.
    fn current_members(&mut self) -> Self::CurrentMembers;

    /// コントローラが管理するマシン群を取得する.
    fn candidate_machines(&mut self) -> Self::CandidateMachines;

    /// レプリカセットのメンバ構成を`members`で置き換える.
    ///
    /// 新規に合成されたメンバへのIDの割り当ては、実装側の責務となる.
    fn reconfigure(&mut self, members: Vec<Member>) -> Self::Reconfigure;

    /// 種別に応じた時間のタイムアウトオブジェクトを生成する.
    fn create_timeout(&mut self, kind: TimeoutKind) -> Self::Timeout;
}
