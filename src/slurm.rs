//! SLURM scheduler environment.
//!
//! Reads the job layout SLURM exports to each task so the benchmark can log
//! where it is running. Every field is `None` when its variable is unset,
//! e.g. outside a SLURM allocation.
//!
//! | Field | Variable |
//! |-------|----------|
//! | `job_id` | `SLURM_JOB_ID` |
//! | `nodes` | `SLURM_NNODES` |
//! | `tasks` | `SLURM_NTASKS` |
//! | `tasks_per_node` | `SLURM_NTASKS_PER_NODE`, else first entry of `SLURM_TASKS_PER_NODE` |
//! | `local_id` | `SLURM_LOCALID` |
//! | `node_name` | `SLURMD_NODENAME`, else `SLURM_NODENAME` |
//! | `node_list` | `SLURM_NODELIST` |

use std::env;
use std::fmt;
use std::str::FromStr;

fn var(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn parsed<T: FromStr>(name: &str) -> Option<T> {
    var(name).and_then(|s| s.trim().parse().ok())
}

/// Job layout as seen by one task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobEnvironment {
    /// Job identifier
    pub job_id: Option<String>,
    /// Allocated nodes
    pub nodes: Option<usize>,
    /// Total tasks in the job
    pub tasks: Option<usize>,
    /// Tasks placed on each node
    pub tasks_per_node: Option<usize>,
    /// This task's index on its node
    pub local_id: Option<usize>,
    /// Name of this task's node
    pub node_name: Option<String>,
    /// Compact node list, e.g. `node[001-004]`
    pub node_list: Option<String>,
}

impl JobEnvironment {
    /// Read the SLURM variables of the current process, or `None` outside a
    /// SLURM job.
    pub fn detect() -> Option<Self> {
        let job_id = var("SLURM_JOB_ID")?;
        Some(JobEnvironment {
            job_id: Some(job_id),
            nodes: parsed("SLURM_NNODES"),
            tasks: parsed("SLURM_NTASKS"),
            tasks_per_node: parsed("SLURM_NTASKS_PER_NODE").or_else(|| {
                // SLURM_TASKS_PER_NODE looks like "4(x2),3"
                var("SLURM_TASKS_PER_NODE")
                    .and_then(|s| s.split(['(', ',']).next().and_then(|n| n.parse().ok()))
            }),
            local_id: parsed("SLURM_LOCALID"),
            node_name: var("SLURMD_NODENAME").or_else(|| var("SLURM_NODENAME")),
            node_list: var("SLURM_NODELIST"),
        })
    }
}

impl fmt::Display for JobEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: &Option<usize>| v.map_or_else(|| "?".to_string(), |n| n.to_string());
        write!(
            f,
            "SLURM job {} ({} tasks on {} nodes, {} per node) nodelist={}",
            self.job_id.as_deref().unwrap_or("?"),
            show(&self.tasks),
            show(&self.nodes),
            show(&self.tasks_per_node),
            self.node_list.as_deref().unwrap_or("?"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Environment mutation is process-global, so every case lives in one test.
    #[test]
    fn slurm_env_var_parsing() {
        const VARS: [&str; 9] = [
            "SLURM_JOB_ID",
            "SLURM_NNODES",
            "SLURM_NTASKS",
            "SLURM_NTASKS_PER_NODE",
            "SLURM_TASKS_PER_NODE",
            "SLURM_LOCALID",
            "SLURMD_NODENAME",
            "SLURM_NODENAME",
            "SLURM_NODELIST",
        ];
        let saved: Vec<_> = VARS.iter().map(|v| (*v, env::var(v).ok())).collect();
        let clear = || {
            for v in VARS {
                unsafe { env::remove_var(v) };
            }
        };

        // --- outside a job ---
        clear();
        assert_eq!(JobEnvironment::detect(), None);

        // --- full layout, compact tasks-per-node form ---
        unsafe {
            env::set_var("SLURM_JOB_ID", "12345");
            env::set_var("SLURM_NNODES", "2");
            env::set_var("SLURM_NTASKS", "8");
            env::set_var("SLURM_TASKS_PER_NODE", "4(x2)");
            env::set_var("SLURM_LOCALID", "3");
            env::set_var("SLURM_NODENAME", "nid001");
            env::set_var("SLURM_NODELIST", "nid[001-002]");
        }
        let job = JobEnvironment::detect().unwrap();
        assert_eq!(job.job_id.as_deref(), Some("12345"));
        assert_eq!(job.nodes, Some(2));
        assert_eq!(job.tasks, Some(8));
        assert_eq!(job.tasks_per_node, Some(4));
        assert_eq!(job.local_id, Some(3));
        assert_eq!(job.node_name.as_deref(), Some("nid001"));
        assert_eq!(
            job.to_string(),
            "SLURM job 12345 (8 tasks on 2 nodes, 4 per node) nodelist=nid[001-002]"
        );

        // --- explicit tasks-per-node and daemon node name take priority ---
        unsafe {
            env::set_var("SLURM_NTASKS_PER_NODE", "8");
            env::set_var("SLURMD_NODENAME", "nid009");
        }
        let job = JobEnvironment::detect().unwrap();
        assert_eq!(job.tasks_per_node, Some(8));
        assert_eq!(job.node_name.as_deref(), Some("nid009"));

        // --- heterogeneous list keeps the first count ---
        unsafe {
            env::remove_var("SLURM_NTASKS_PER_NODE");
            env::set_var("SLURM_TASKS_PER_NODE", "3,2");
        }
        assert_eq!(JobEnvironment::detect().unwrap().tasks_per_node, Some(3));

        clear();
        for (name, value) in saved {
            if let Some(value) = value {
                unsafe { env::set_var(name, value) };
            }
        }
    }
}
