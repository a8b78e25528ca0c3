//! Chain composer: a pipeline built from policies in caller order.
//!
//! The last policy in the list is bound to the command; every earlier policy
//! wraps its successor. Running the head walks the pipeline outside-in, and
//! each layer records its metric into one shared [`MetricSet`] on the way
//! back out.

use crate::command::Command;
use crate::error::PolicyError;
use crate::metrics::MetricSet;
use crate::policy::Policy;

/// Failure of a composed execution: the engine error plus whatever metrics
/// were recorded before it propagated out. Validation rejections carry an
/// empty set.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{error}")]
pub struct ExecutionError {
    #[source]
    pub error: PolicyError,
    pub metrics: MetricSet,
}

impl ExecutionError {
    pub(crate) fn bare(error: PolicyError) -> Self {
        Self { error, metrics: MetricSet::new() }
    }
}

/// An ordered list of policies awaiting a command.
///
/// The policies are templates: every `execute` clones and rebinds them, so a
/// chain can be executed repeatedly (and concurrently) against different
/// commands.
#[derive(Debug, Clone)]
pub struct Chain {
    policies: Vec<Policy>,
}

/// Compose policies in the given order, outermost first.
pub fn chain(policies: Vec<Policy>) -> Chain {
    Chain { policies }
}

impl Chain {
    /// Bind `command` at the end of the pipeline and run it.
    ///
    /// Before-hooks observe outer-to-inner order, after-hooks the reverse.
    pub async fn execute(&self, command: Command) -> Result<MetricSet, ExecutionError> {
        let mut rest = self.policies.iter().rev();
        let innermost = rest
            .next()
            .ok_or_else(|| ExecutionError::bare(PolicyError::PolicyRequired))?;

        let mut pipeline = innermost.clone().with_command(command);
        for policy in rest {
            pipeline = policy.clone().with_policy(pipeline);
        }

        let mut metrics = MetricSet::new();
        match pipeline.run(&mut metrics).await {
            Ok(()) => Ok(metrics),
            Err(error) => Err(ExecutionError { error, metrics }),
        }
    }
}
