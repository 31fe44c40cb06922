//! ピアグループの望ましいメンバ構成を計算するための、純粋な調停処理.
//!
//! この処理はI/Oや並行性を一切持たず、同一の入力に対しては
//! 常に同一の出力を返す. 入力の取得と、計算結果の適用は、
//! 呼び出し側(典型的には`PeerGrouper`ワーカー)の責務となる.
use std::cmp;
use std::collections::BTreeMap;

use crate::address::{join_host_port, select_internal_address};
use crate::machine::{Machine, MachineId};
use crate::member::{Member, MemberStatus, MACHINE_ID_TAG};
use crate::{ErrorKind, Result};

/// 調停処理への入力一式.
#[derive(Debug, Clone)]
pub struct PeerGroupInfo {
    /// コントローラが管理するマシン群.
    pub machines: Vec<Machine>,

    /// レプリカセットから取得した、各メンバのステータス群.
    pub statuses: Vec<MemberStatus>,

    /// レプリカセットの現在のメンバ群.
    pub members: Vec<Member>,

    /// 各メンバのアドレスに付与するTCPポート番号.
    pub mongo_port: u16,
}

/// 現在の状況から、レプリカセットの望ましいメンバ構成を計算する.
///
/// 現在の構成が既に望ましい状態である場合には`None`が返され、
/// 呼び出し側は再構成を行ってはならない.
/// 変更が必要な場合には、適用すべきメンバ構成の全体が返される.
///
/// 計算の過程で、各マシンの`voting`フラグは調停後の投票状態に更新される.
/// 「投票メンバの総数は奇数」という不変条件を維持するため、
/// 投票権の付与と剥奪は対にして行われ、対にできない端数は
/// 次の調停周期まで先送りされる.
///
/// # Errors
///
/// 候補マシンに紐付かない投票メンバが存在する場合には、
/// `ErrorKind::ExtraVotingMember`を理由としたエラーが返される.
///
/// 同一のマシンに紐付くメンバが複数存在する場合には、
/// `ErrorKind::InvalidInput`を理由としたエラーが返される.
pub fn desired_peer_group(info: &mut PeerGroupInfo) -> Result<Option<Vec<Member>>> {
    let mut changed = false;

    // マシンの削除や降格の後には、紐付かないメンバが見つかることがある.
    // その場合は事前に非投票へ降格済みのはずなので、構成から取り除くだけでよい.
    // 投票権を持ったままの場合は、勝手に剥奪するとプライマリを
    // 巻き込んでクォーラムを失う危険があるため、エラーとする.
    let (mut members, extra) = track!(members_map(&info.members, &info.machines))?;
    for member in &extra {
        track_assert!(
            !member.is_voting(),
            ErrorKind::ExtraVotingMember,
            "member.id={:?}",
            member.id
        );
        changed = true;
    }

    let statuses = statuses_map(&info.statuses, &members);

    let mut to_remove_vote = Vec::new();
    let mut to_add_vote = Vec::new();
    for m in &mut info.machines {
        let is_voting = members.get(&m.id).map_or(false, Member::is_voting);
        m.voting = is_voting;
        match (m.candidate, is_voting) {
            // 既に投票メンバなので、何もする必要はない.
            (true, true) => {}
            (true, false) => {
                if statuses.get(&m.id).map_or(false, MemberStatus::is_ready) {
                    to_add_vote.push(m.id.clone());
                }
            }
            (false, true) => to_remove_vote.push(m.id.clone()),
            // 非投票のまま維持される.
            (false, false) => {}
        }
    }
    // 挙動を決定的にするため、ID順で前方のマシンから優先的に処理する.
    to_remove_vote.sort();
    to_add_vote.sort();

    // 投票権の移動. 剥奪と付与を対にして行うため、総投票数は変化しない.
    let nreplace = cmp::min(to_remove_vote.len(), to_add_vote.len());
    for i in 0..nreplace {
        set_voting(&mut members, &mut info.machines, &to_remove_vote[i], false);
        set_voting(&mut members, &mut info.machines, &to_add_vote[i], true);
        changed = true;
    }
    let to_add_vote = &to_add_vote[nreplace..];
    let to_remove_vote = &to_remove_vote[nreplace..];

    // この時点で、二つのリストの少なくとも一方は空になっている.
    // 残った側からは偶数個だけを処理することで、総投票数の奇偶を保存する.
    // 対にできない端数の一つは、次の調停周期まで先送りされる.
    if !to_add_vote.is_empty() {
        let n = to_add_vote.len() - to_add_vote.len() % 2;
        for id in &to_add_vote[..n] {
            set_voting(&mut members, &mut info.machines, id, true);
            changed = true;
        }
    } else {
        let n = to_remove_vote.len() - to_remove_vote.len() % 2;
        for id in &to_remove_vote[..n] {
            set_voting(&mut members, &mut info.machines, id, false);
            changed = true;
        }
    }

    // メンバ未登録の候補マシンは、非投票メンバとして新規に合成する.
    // 投票権の付与は、初期同期の完了が観測された後の周期で改めて行われる.
    for m in &info.machines {
        if m.candidate && !members.contains_key(&m.id) {
            members.insert(m.id.clone(), Member::with_machine_id(&m.id));
            changed = true;
        }
    }

    // 各メンバのアドレスを、マシンの現在の内部アドレスに追従させる.
    for m in &info.machines {
        if !m.candidate {
            continue;
        }
        let addr = match select_internal_address(&m.addresses) {
            Some(host) => join_host_port(host, info.mongo_port),
            None => continue,
        };
        if let Some(member) = members.get_mut(&m.id) {
            if member.address.as_ref() != Some(&addr) {
                member.address = Some(addr);
                changed = true;
            }
        }
    }

    if !changed {
        return Ok(None);
    }
    Ok(Some(members.into_iter().map(|(_, member)| member).collect()))
}

/// 投票状態の変更を、メンバ側とマシン側の両方に反映する.
fn set_voting(
    members: &mut BTreeMap<MachineId, Member>,
    machines: &mut [Machine],
    id: &MachineId,
    voting: bool,
) {
    if let Some(member) = members.get_mut(id) {
        member.set_voting(voting);
    }
    if let Some(m) = machines.iter_mut().find(|m| m.id == *id) {
        m.voting = voting;
    }
}

/// メンバ群を、タグでマシンに紐付くもの(マシンID引き)と、
/// どのマシンにも紐付かない余剰なものとに分離する.
///
/// 同一のタグ値を持つメンバは高々一つでなければならず、
/// 違反している場合には`ErrorKind::InvalidInput`となる.
fn members_map(
    members: &[Member],
    machines: &[Machine],
) -> Result<(BTreeMap<MachineId, Member>, Vec<Member>)> {
    let mut bound = BTreeMap::new();
    let mut extra = Vec::new();
    for member in members {
        let machine = member
            .tags
            .get(MACHINE_ID_TAG)
            .and_then(|id| machines.iter().find(|m| m.id.as_str() == id.as_str()));
        if let Some(m) = machine {
            track_assert!(
                !bound.contains_key(&m.id),
                ErrorKind::InvalidInput,
                "duplicate tag: machine.id={:?}",
                m.id
            );
            bound.insert(m.id.clone(), member.clone());
        } else {
            extra.push(member.clone());
        }
    }
    Ok((bound, extra))
}

/// ステータス群を、対応するメンバのIDを経由してマシンに紐付ける.
///
/// 紐付くメンバが存在しないマシンや、ステータスが報告されていない
/// メンバのマシンは、結果に含まれない(「準備未完了」として扱われる).
fn statuses_map(
    statuses: &[MemberStatus],
    members: &BTreeMap<MachineId, Member>,
) -> BTreeMap<MachineId, MemberStatus> {
    let mut map = BTreeMap::new();
    for status in statuses {
        if let Some((id, _)) = members.iter().find(|(_, member)| member.id == status.id) {
            map.insert(id.clone(), status.clone());
        }
    }
    map
}
