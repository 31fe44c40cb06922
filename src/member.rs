//! レプリカセット側から見たメンバ関連の構成要素.
use std::collections::BTreeMap;

use crate::machine::MachineId;

/// メンバとマシンを紐付けるためのタグ名.
pub const MACHINE_ID_TAG: &str = "juju-machine-id";

/// レプリカセットが割り当てるメンバのID.
///
/// 一つのメンバ構成の世代の中では安定している.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberId(u32);
impl MemberId {
    /// 値が`number`となる`MemberId`インスタンスを生成する.
    pub fn new(number: u32) -> Self {
        MemberId(number)
    }

    /// このインスタンスのIDの値を返す.
    pub fn as_u32(self) -> u32 {
        self.0
    }
}
impl From<u32> for MemberId {
    fn from(f: u32) -> Self {
        MemberId::new(f)
    }
}

/// レプリカセットのメンバ.
///
/// `votes`と`priority`は「値が存在しない」こと自体が意味を持つため、
/// `Option`で表現されている(`0`への畳み込みは行わない).
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Member {
    /// レプリカセットが割り当てたID.
    ///
    /// 新規に合成されたメンバでは未割り当て(デフォルト値)のままとなり、
    /// 実際のIDは再構成時にドライバ側で割り当てられる.
    pub id: MemberId,

    /// `host:port`形式のアドレス.
    pub address: Option<String>,

    /// メンバに付与されたタグ群.
    ///
    /// タグ`juju-machine-id`が、メンバをコントローラのマシンに紐付ける.
    pub tags: BTreeMap<String, String>,

    /// 投票数.
    ///
    /// 存在しない場合は、プロトコル上は暗黙の一票として扱われる.
    pub votes: Option<i32>,

    /// プライマリ選出の優先度.
    ///
    /// 明示的な`0.0`は、プライマリへの選出を禁止する.
    pub priority: Option<f64>,
}
impl Member {
    /// `machine_id`のマシンに紐付く、新しい非投票メンバを生成する.
    pub fn with_machine_id(machine_id: &MachineId) -> Self {
        let mut member = Member::default();
        member
            .tags
            .insert(MACHINE_ID_TAG.to_string(), machine_id.as_str().to_string());
        member.set_voting(false);
        member
    }

    /// 紐付いているマシンのIDを返す.
    pub fn machine_id(&self) -> Option<MachineId> {
        self.tags
            .get(MACHINE_ID_TAG)
            .map(|id| MachineId::new(id.as_str()))
    }

    /// 投票権を有するメンバかどうかを判定する.
    ///
    /// `votes`が存在しないメンバは、暗黙の一票を持つ投票メンバとして扱われる.
    pub fn is_voting(&self) -> bool {
        self.votes.map_or(true, |v| v > 0)
    }

    /// メンバの投票状態を設定する.
    ///
    /// 投票メンバは`votes`と`priority`が未設定となり、
    /// レプリカセットのデフォルト値を受け入れる.
    /// 非投票メンバは明示的に`votes = 0`および`priority = 0.0`となり、
    /// プライマリに選出されることはない.
    pub fn set_voting(&mut self, voting: bool) {
        if voting {
            self.votes = None;
            self.priority = None;
        } else {
            self.votes = Some(0);
            self.priority = Some(0.0);
        }
    }
}

/// レプリカセットが報告するメンバの状態.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum MemberState {
    Startup,
    Primary,
    Secondary,
    Recovering,
    Fatal,
    Startup2,
    Unknown,
    Arbiter,
    Down,
    Rollback,
    Shunned,
}

/// メンバの健全性ステータス.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberStatus {
    /// 対応するメンバのID.
    pub id: MemberId,

    /// ステータス取得時点でのメンバのアドレス.
    pub address: Option<String>,

    /// メンバと正常に疎通できているかどうか.
    pub healthy: bool,

    /// メンバの状態.
    pub state: MemberState,
}
impl MemberStatus {
    /// メンバがレプリカセットへの参加と初期同期を完了しているかどうかを判定する.
    ///
    /// 健全なプライマリないしセカンダリのみが、投票権付与の対象となる.
    pub fn is_ready(&self) -> bool {
        self.healthy
            && (self.state == MemberState::Primary || self.state == MemberState::Secondary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_voting_treats_missing_votes_as_implicit() {
        let mut member = Member::default();
        assert!(member.is_voting());

        member.votes = Some(1);
        assert!(member.is_voting());

        member.votes = Some(0);
        assert!(!member.is_voting());
    }

    #[test]
    fn set_voting_updates_votes_and_priority() {
        let mut member = Member::default();
        member.set_voting(false);
        assert_eq!(member.votes, Some(0));
        assert_eq!(member.priority, Some(0.0));

        member.set_voting(true);
        assert_eq!(member.votes, None);
        assert_eq!(member.priority, None);
    }

    #[test]
    fn with_machine_id_synthesizes_nonvoting_member() {
        let member = Member::with_machine_id(&"m1".into());
        assert_eq!(member.machine_id(), Some("m1".into()));
        assert!(!member.is_voting());
        assert_eq!(member.id, MemberId::default());
        assert_eq!(member.address, None);
    }

    #[test]
    fn is_ready_requires_healthy_primary_or_secondary() {
        let mut status = MemberStatus {
            id: MemberId::new(1),
            address: None,
            healthy: true,
            state: MemberState::Secondary,
        };
        assert!(status.is_ready());

        status.state = MemberState::Primary;
        assert!(status.is_ready());

        status.state = MemberState::Recovering;
        assert!(!status.is_ready());

        status.state = MemberState::Primary;
        status.healthy = false;
        assert!(!status.is_ready());
    }
}
