//! Helpers shared by the commands that operate on a single pod.

mod pod_source;

pub use self::pod_source::{PodSource, SourcedPod};
