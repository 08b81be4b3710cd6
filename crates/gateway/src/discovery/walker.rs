//! Depth-first walk of a device address space.
//!
//! The walk never fails. A child whose class or name cannot be read is
//! skipped together with its subtree; a node whose children cannot be
//! enumerated is treated as a leaf. Both are counted in the report.

use std::collections::BTreeMap;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use pb_protocol::{NodeClass, NodeHandle, SessionGuard};

/// Everything a walk produced.
#[derive(Debug, Default)]
pub struct WalkReport {
    /// Value-bearing nodes by name. A later node with the same name
    /// replaces an earlier one.
    pub points: BTreeMap<String, String>,
    /// Nodes whose children were enumerated.
    pub visited: usize,
    pub skipped: usize,
    pub browse_failures: usize,
}

enum ChildOutcome {
    Recorded,
    Structural,
    Skipped,
}

pub async fn walk(session: &SessionGuard, root: &NodeHandle) -> WalkReport {
    let mut report = WalkReport::default();
    descend(session, root.clone(), &mut report).await;
    report
}

fn descend<'a>(
    session: &'a SessionGuard,
    node: NodeHandle,
    report: &'a mut WalkReport,
) -> BoxFuture<'a, ()> {
    async move {
        let children = match session.children(&node).await {
            Ok(children) => children,
            Err(fault) => {
                tracing::warn!(node = %node, error = %fault, "cannot enumerate children, not descending");
                report.browse_failures += 1;
                return;
            }
        };
        report.visited += 1;

        for child in children {
            match inspect(session, &child, report).await {
                ChildOutcome::Skipped => continue,
                ChildOutcome::Recorded | ChildOutcome::Structural => {
                    descend(session, child, report).await;
                }
            }
        }
    }
    .boxed()
}

async fn inspect(session: &SessionGuard, child: &NodeHandle, report: &mut WalkReport) -> ChildOutcome {
    let class = match session.classify(child).await {
        Ok(class) => class,
        Err(fault) => {
            tracing::warn!(node = %child, error = %fault, "skipping node, class unreadable");
            report.skipped += 1;
            return ChildOutcome::Skipped;
        }
    };
    if class == NodeClass::Structural {
        return ChildOutcome::Structural;
    }

    match session.name(child).await {
        Ok(name) => {
            report
                .points
                .insert(name, child.identifier().to_owned());
            ChildOutcome::Recorded
        }
        Err(fault) => {
            tracing::warn!(node = %child, error = %fault, "skipping node, name unreadable");
            report.skipped += 1;
            ChildOutcome::Skipped
        }
    }
}
