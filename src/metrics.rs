//! peergroup のメトリクス。

use prometrics::metrics::{Counter, Gauge, MetricBuilder};

use crate::Result;

/// 調停ワーカーに関するメトリクス。
#[derive(Clone)]
pub struct PeerGrouperMetrics {
    pub(crate) cycle_total: Counter,
    pub(crate) reconfigure_total: Counter,
    pub(crate) unchanged_total: Counter,
    pub(crate) failure_total: Counter,
    pub(crate) members: Gauge,
    pub(crate) voting_members: Gauge,
}
impl PeerGrouperMetrics {
    pub(crate) fn new(builder: &MetricBuilder) -> Result<Self> {
        let mut builder: MetricBuilder = builder.clone();
        builder.subsystem("reconcile");
        let cycle_total = track!(builder
            .counter("cycle_total")
            .help("Number of reconciliation cycles started")
            .finish())?;
        let reconfigure_total = track!(builder
            .counter("reconfigure_total")
            .help("Number of cycles that issued a reconfiguration")
            .finish())?;
        let unchanged_total = track!(builder
            .counter("unchanged_total")
            .help("Number of cycles that left the configuration untouched")
            .finish())?;
        let failure_total = track!(builder
            .counter("failure_total")
            .help("Number of cycles that ended in an error")
            .finish())?;
        let members = track!(builder
            .gauge("members")
            .help("Number of replica set members last observed")
            .finish())?;
        let voting_members = track!(builder
            .gauge("voting_members")
            .help("Number of voting replica set members last observed")
            .finish())?;
        Ok(Self {
            cycle_total,
            reconfigure_total,
            unchanged_total,
            failure_total,
            members,
            voting_members,
        })
    }
}
