//! State shared with the HTTP handlers.

use std::time::Instant;
use tokio::sync::mpsc;

use crate::commands::NodeCommand;

pub struct NodeState {
    pub start_time: Instant,
    pub command_tx: mpsc::Sender<NodeCommand>,
}

impl NodeState {
    pub fn new(command_tx: mpsc::Sender<NodeCommand>) -> Self {
        Self {
            start_time: Instant::now(),
            command_tx,
        }
    }
}
