use futures::{Async, Future, Poll, Stream};
use prometrics::metrics::MetricBuilder;
use std::mem;

use crate::desired::{desired_peer_group, PeerGroupInfo};
use crate::io::{Io, TimeoutKind};
use crate::machine::Machine;
use crate::member::{Member, MemberStatus};
use crate::metrics::PeerGrouperMetrics;
use crate::{Error, Result};

/// レプリカセットのメンバ構成を望ましい状態へ収束させ続ける調停ワーカー.
///
/// 一周期の調停は「ステータス群・メンバ群・マシン群の取得」
/// 「望ましい構成の計算」「必要であれば再構成の実行」から成り、
/// 構成の計算自体は純粋な同期処理として`desired::desired_peer_group`関数が担う.
/// 新しい周期は、`Io`からの変更通知ないし周期タイマーの発火で開始される.
///
/// `PeerGrouper`は`Stream`トレイトを実装しているが、
/// これは無限ストリームであり、エラー時を除いて終了することはない.
/// 周期の中で発生したエラーは致命的なものとしては扱われず、
/// `Event::ReconcileFailed`として利用者に通知された後、
/// バックオフを挟んで調停が再開される(その間、構成は変更されない).
pub struct PeerGrouper<IO: Io> {
    io: IO,
    mongo_port: u16,
    phase: Phase<IO>,
    statuses: Vec<MemberStatus>,
    members: Vec<Member>,
    pending: Option<Vec<Member>>,
    metrics: PeerGrouperMetrics,
}
impl<IO: Io> PeerGrouper<IO> {
    /// 新しい`PeerGrouper`インスタンスを生成する.
    ///
    /// 最初の調停周期は、通知やタイマーを待たずに即座に開始される.
    pub fn new(mut io: IO, mongo_port: u16, metric_builder: &MetricBuilder) -> Result<Self> {
        let mut metric_builder = metric_builder.clone();
        metric_builder.namespace("peergroup");
        let metrics = track!(PeerGrouperMetrics::new(&metric_builder))?;
        metrics.cycle_total.increment();
        let phase = Phase::FetchStatuses(io.current_statuses());
        Ok(PeerGrouper {
            io,
            mongo_port,
            phase,
            statuses: Vec::new(),
            members: Vec::new(),
            pending: None,
            metrics,
        })
    }

    /// ワーカーのメトリクスを返す.
    pub fn metrics(&self) -> &PeerGrouperMetrics {
        &self.metrics
    }

    /// I/O実装に対する参照を返す.
    pub fn io(&self) -> &IO {
        &self.io
    }

    /// I/O実装に対する破壊的な参照を返す.
    ///
    /// # Safety
    ///
    /// 破壊的な操作は、調停処理の管理外の挙動となり、
    /// 整合性を崩してしまう可能性もあるので、
    /// 注意を喚起する意味で`unsafe`と設定されている.
    pub unsafe fn io_mut(&mut self) -> &mut IO {
        &mut self.io
    }

    fn reduce(&mut self, machines: Vec<Machine>) -> Result<Option<Vec<Member>>> {
        let mut info = PeerGroupInfo {
            machines,
            statuses: mem::replace(&mut self.statuses, Vec::new()),
            members: mem::replace(&mut self.members, Vec::new()),
            mongo_port: self.mongo_port,
        };
        self.observe(&info.members);
        track!(desired_peer_group(&mut info))
    }

    fn observe(&self, members: &[Member]) {
        self.metrics.members.set(members.len() as f64);
        let voting = members.iter().filter(|m| m.is_voting()).count();
        self.metrics.voting_members.set(voting as f64);
    }
}
impl<IO: Io> Stream for PeerGrouper<IO> {
    type Item = Event;
    type Error = Error;
    fn poll(&mut self) -> Poll<Option<Self::Item>, Self::Error> {
        loop {
            let step = match self.phase {
                Phase::Wait(ref mut timeout) => {
                    let fired = if track!(self.io.try_recv_change())?.is_some() {
                        true
                    } else {
                        track!(timeout.poll())?.is_ready()
                    };
                    if fired {
                        self.metrics.cycle_total.increment();
                        Step::Next(Phase::FetchStatuses(self.io.current_statuses()))
                    } else {
                        Step::NotReady
                    }
                }
                Phase::FetchStatuses(ref mut f) => match track!(f.poll()) {
                    Err(e) => Step::Fail(e),
                    Ok(Async::NotReady) => Step::NotReady,
                    Ok(Async::Ready(statuses)) => {
                        self.statuses = statuses;
                        Step::Next(Phase::FetchMembers(self.io.current_members()))
                    }
                },
                Phase::FetchMembers(ref mut f) => match track!(f.poll()) {
                    Err(e) => Step::Fail(e),
                    Ok(Async::NotReady) => Step::NotReady,
                    Ok(Async::Ready(members)) => {
                        self.members = members;
                        Step::Next(Phase::FetchMachines(self.io.candidate_machines()))
                    }
                },
                Phase::FetchMachines(ref mut f) => match track!(f.poll()) {
                    Err(e) => Step::Fail(e),
                    Ok(Async::NotReady) => Step::NotReady,
                    Ok(Async::Ready(machines)) => Step::Reduce(machines),
                },
                Phase::Reconfigure(ref mut f) => match track!(f.poll()) {
                    Err(e) => Step::Fail(e),
                    Ok(Async::NotReady) => Step::NotReady,
                    Ok(Async::Ready(())) => Step::Reconfigured,
                },
            };
            match step {
                Step::NotReady => return Ok(Async::NotReady),
                Step::Next(phase) => {
                    self.phase = phase;
                }
                Step::Reduce(machines) => match self.reduce(machines) {
                    Err(error) => {
                        self.metrics.failure_total.increment();
                        self.phase = Phase::Wait(self.io.create_timeout(TimeoutKind::Backoff));
                        return Ok(Async::Ready(Some(Event::ReconcileFailed { error })));
                    }
                    Ok(None) => {
                        self.metrics.unchanged_total.increment();
                        self.phase = Phase::Wait(self.io.create_timeout(TimeoutKind::Interval));
                        return Ok(Async::Ready(Some(Event::Unchanged)));
                    }
                    Ok(Some(members)) => {
                        self.observe(&members);
                        let future = self.io.reconfigure(members.clone());
                        self.pending = Some(members);
                        self.phase = Phase::Reconfigure(future);
                    }
                },
                Step::Fail(error) => {
                    self.metrics.failure_total.increment();
                    self.phase = Phase::Wait(self.io.create_timeout(TimeoutKind::Backoff));
                    return Ok(Async::Ready(Some(Event::ReconcileFailed { error })));
                }
                Step::Reconfigured => {
                    self.metrics.reconfigure_total.increment();
                    let members = self.pending.take().unwrap_or_default();
                    self.phase = Phase::Wait(self.io.create_timeout(TimeoutKind::Interval));
                    return Ok(Async::Ready(Some(Event::Reconfigured { members })));
                }
            }
        }
    }
}

/// `PeerGrouper`から発生するイベント一覧.
#[derive(Debug)]
pub enum Event {
    /// メンバ構成の再構成が適用された.
    Reconfigured {
        /// 適用されたメンバ構成.
        members: Vec<Member>,
    },

    /// 構成は既に望ましい状態であり、変更は行われなかった.
    Unchanged,

    /// 調停周期がエラーで中断された.
    ///
    /// このイベントは致命的ではなく、バックオフ後に調停は再開される.
    /// レプリカセットの構成は変更されていない.
    ReconcileFailed {
        /// 中断の原因.
        error: Error,
    },
}

enum Phase<IO: Io> {
    Wait(IO::Timeout),
    FetchStatuses(IO::CurrentStatuses),
    FetchMembers(IO::CurrentMembers),
    FetchMachines(IO::CandidateMachines),
    Reconfigure(IO::Reconfigure),
}

enum Step<IO: Io> {
    NotReady,
    Next(Phase<IO>),
    Reduce(Vec<Machine>),
    Fail(Error),
    Reconfigured,
}

#[cfg(test)]
mod tests {
    use futures::{Async, Stream};
    use prometrics::metrics::MetricBuilder;
    use trackable::error::ErrorKindExt;

    use super::*;
    use crate::io::Change;
    use crate::member::MemberId;
    use crate::test_util::tests::{machine, ready_status, voting_member, TestIo, TestIoBuilder};
    use crate::ErrorKind;

    fn new_grouper(io: TestIo) -> PeerGrouper<TestIo> {
        PeerGrouper::new(io, 27017, &MetricBuilder::new()).expect("Never fails")
    }

    fn next_event(grouper: &mut PeerGrouper<TestIo>) -> Event {
        match grouper.poll() {
            Ok(Async::Ready(Some(event))) => event,
            other => panic!("unexpected poll result: {:?}", other),
        }
    }

    fn assert_not_ready(grouper: &mut PeerGrouper<TestIo>) {
        match grouper.poll() {
            Ok(Async::NotReady) => {}
            other => panic!("unexpected poll result: {:?}", other),
        }
    }

    #[test]
    fn steady_state_is_left_untouched() {
        let io = TestIoBuilder::new()
            .add_machine(machine("m1", true, "10.0.0.1"))
            .add_member(voting_member("m1", 1, "10.0.0.1"))
            .add_status(ready_status(1))
            .finish();
        let handle = io.handle();
        let mut grouper = new_grouper(io);

        match next_event(&mut grouper) {
            Event::Unchanged => {}
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(handle.reconfigured().is_empty());
        assert_not_ready(&mut grouper);
    }

    #[test]
    fn new_candidate_triggers_reconfiguration() {
        let io = TestIoBuilder::new()
            .add_machine(machine("m1", true, "10.0.0.1"))
            .add_machine(machine("m2", true, "10.0.0.2"))
            .add_member(voting_member("m1", 1, "10.0.0.1"))
            .add_status(ready_status(1))
            .finish();
        let handle = io.handle();
        let mut grouper = new_grouper(io);

        match next_event(&mut grouper) {
            Event::Reconfigured { members } => {
                assert_eq!(members.len(), 2);
                assert_eq!(members.iter().filter(|m| m.is_voting()).count(), 1);
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(handle.reconfigured().len(), 1);

        // タイマーは発火しないので、通知が無い限り次の周期は始まらない。
        assert_not_ready(&mut grouper);

        // 適用済みの構成が観測される二周期目では、変更は発生しない。
        handle.push_change(Change::Machines);
        match next_event(&mut grouper) {
            Event::Unchanged => {}
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(handle.reconfigured().len(), 1);
    }

    #[test]
    fn candidate_removal_triggers_paired_demotion() {
        let mut builder = TestIoBuilder::new();
        for i in 1..=5 {
            let id = format!("m{}", i);
            let host = format!("10.0.0.{}", i);
            builder = builder
                .add_machine(machine(&id, true, &host))
                .add_member(voting_member(&id, i as u32, &host))
                .add_status(ready_status(i as u32));
        }
        let io = builder.finish();
        let handle = io.handle();
        let mut grouper = new_grouper(io);

        match next_event(&mut grouper) {
            Event::Unchanged => {}
            other => panic!("unexpected event: {:?}", other),
        }

        // 二台を候補から外すと、対になった降格が一周期で行われる。
        handle.set_machines(vec![
            machine("m1", true, "10.0.0.1"),
            machine("m2", true, "10.0.0.2"),
            machine("m3", true, "10.0.0.3"),
            machine("m4", false, "10.0.0.4"),
            machine("m5", false, "10.0.0.5"),
        ]);
        handle.push_change(Change::Machines);
        match next_event(&mut grouper) {
            Event::Reconfigured { members } => {
                assert_eq!(members.len(), 5);
                assert_eq!(members.iter().filter(|m| m.is_voting()).count(), 3);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn extra_voting_member_fails_the_cycle() {
        let mut extra = Member::default();
        extra.id = MemberId::new(9);
        extra.votes = Some(1);
        let io = TestIoBuilder::new()
            .add_machine(machine("m1", true, "10.0.0.1"))
            .add_member(voting_member("m1", 1, "10.0.0.1"))
            .add_member(extra)
            .finish();
        let handle = io.handle();
        let mut grouper = new_grouper(io);

        match next_event(&mut grouper) {
            Event::ReconcileFailed { error } => {
                assert_eq!(*error.kind(), ErrorKind::ExtraVotingMember);
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(handle.reconfigured().is_empty());

        // 原因が取り除かれない限り、後続の周期も同様に中断される。
        handle.push_change(Change::ReplicaSet);
        match next_event(&mut grouper) {
            Event::ReconcileFailed { error } => {
                assert_eq!(*error.kind(), ErrorKind::ExtraVotingMember);
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(handle.reconfigured().is_empty());
    }

    #[test]
    fn reconfigure_failure_is_not_fatal() {
        let io = TestIoBuilder::new()
            .add_machine(machine("m1", true, "10.0.0.1"))
            .add_machine(machine("m2", true, "10.0.0.2"))
            .add_member(voting_member("m1", 1, "10.0.0.1"))
            .add_status(ready_status(1))
            .finish();
        let handle = io.handle();
        handle.fail_next_reconfigure(ErrorKind::Other.cause("injected failure").into());
        let mut grouper = new_grouper(io);

        match next_event(&mut grouper) {
            Event::ReconcileFailed { error } => {
                assert_eq!(*error.kind(), ErrorKind::Other);
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(handle.reconfigured().is_empty());

        // バックオフ後の周期では、改めて計算された構成が適用される。
        handle.push_change(Change::ReplicaSet);
        match next_event(&mut grouper) {
            Event::Reconfigured { members } => {
                assert_eq!(members.len(), 2);
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(handle.reconfigured().len(), 1);
    }
}
