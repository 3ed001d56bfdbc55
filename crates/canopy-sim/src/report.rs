//! Run-log rendering.
//!
//! Every [`SimEvent`] becomes exactly one line of the log artifact, in
//! the order the scheduler recorded them.

use std::fs;
use std::io;
use std::path::Path;

use canopy_network::Network;
use canopy_protocol::SimEvent;

pub fn render(events: &[SimEvent]) -> String {
    let mut out = String::new();
    for event in events {
        match event {
            SimEvent::RoundLeaders(ids) => {
                let joined = ids
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                out.push_str(&format!("bs {joined}\n"));
            }
            SimEvent::Elected(id) => out.push_str(&format!("elected {id}\n")),
            SimEvent::EdgeAdded(edge) => out.push_str(&format!("added {edge}\n")),
            SimEvent::DataHop { from, to, energy } => {
                out.push_str(&format!("data from {from} to {to}, energy:{energy}\n"));
            }
            SimEvent::NodeDown(id) => out.push_str(&format!("node down {id}\n")),
        }
    }
    out
}

/// Writes the rendered log, creating the parent directory if needed.
pub fn write_log(events: &[SimEvent], path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, render(events))
}

/// The per-node tree listing printed when a run finishes.
pub fn tree_summary(net: &Network) -> String {
    let mut out = String::new();
    for node in net.nodes() {
        out.push_str(&format!("Tree nodes for {} ", node.id()));
        for link in node.tree_links() {
            out.push_str(&format!("{link} "));
        }
        out.push('\n');
    }
    out
}
