//! Process table: one row per image name, with an instance count.

use backend::{ProcessEntry, ProcessSet};
use eframe::egui;
use egui_extras::{Column, TableBuilder};
use std::collections::BTreeMap;

/// How a row relates to the keep-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RowStatus {
    Protected,
    Kept,
    Extra,
    /// No keep-list saved yet.
    Unknown,
}

impl RowStatus {
    fn label(&self) -> &'static str {
        match self {
            RowStatus::Protected => "protected",
            RowStatus::Kept => "kept",
            RowStatus::Extra => "will close",
            RowStatus::Unknown => "-",
        }
    }

    fn color(&self) -> egui::Color32 {
        match self {
            RowStatus::Protected => egui::Color32::from_rgb(120, 160, 255),
            RowStatus::Kept => egui::Color32::from_rgb(80, 200, 120),
            RowStatus::Extra => egui::Color32::from_rgb(230, 80, 80),
            RowStatus::Unknown => egui::Color32::GRAY,
        }
    }
}

/// All running instances of one image.
#[derive(Debug, Clone)]
pub struct ProcessGroup {
    pub name: String,
    pub pids: Vec<u32>,
    pub memory_kb: u64,
    pub status: RowStatus,
}

impl ProcessGroup {
    /// `name (N)` when more than one instance is running.
    pub fn display_name(&self) -> String {
        if self.pids.len() > 1 {
            format!("{} ({})", self.name, self.pids.len())
        } else {
            self.name.clone()
        }
    }
}

/// Merge instances by image name and tag each group against the keep-list.
pub fn group_processes(
    processes: &[ProcessEntry],
    kept: Option<&ProcessSet>,
    protected: &ProcessSet,
) -> Vec<ProcessGroup> {
    let mut groups: BTreeMap<&str, (Vec<u32>, u64)> = BTreeMap::new();
    for p in processes {
        let entry = groups.entry(p.name.as_str()).or_default();
        entry.0.push(p.pid);
        entry.1 += p.memory_kb;
    }

    groups
        .into_iter()
        .map(|(name, (pids, memory_kb))| {
            let status = if protected.contains(name) {
                RowStatus::Protected
            } else {
                match kept {
                    Some(kept) if kept.contains(name) => RowStatus::Kept,
                    Some(_) => RowStatus::Extra,
                    None => RowStatus::Unknown,
                }
            };
            ProcessGroup {
                name: name.to_string(),
                pids,
                memory_kb,
                status,
            }
        })
        .collect()
}

// Filter groups based on search text
fn filter_groups(groups: &[ProcessGroup], search_text: &str) -> Vec<ProcessGroup> {
    if search_text.is_empty() {
        return groups.to_vec();
    }

    let search_lower = search_text.to_lowercase();
    groups
        .iter()
        .filter(|g| {
            g.name.to_lowercase().contains(&search_lower)
                || g.pids.iter().any(|pid| pid.to_string().contains(&search_lower))
        })
        .cloned()
        .collect()
}

#[derive(Default, PartialEq, Eq, Clone, Copy)]
pub enum SortColumn {
    #[default]
    Name,
    Instances,
    Memory,
    Status,
}

pub struct ProcessTable {
    pub sort_column: SortColumn,
    pub sort_descending: bool,
    pub show_pids: bool,
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self {
            sort_column: SortColumn::Name,
            sort_descending: false,
            show_pids: false,
        }
    }
}

impl ProcessTable {
    pub fn show(&mut self, ui: &mut egui::Ui, groups: &[ProcessGroup], search_text: &str) -> usize {
        let mut rows = filter_groups(groups, search_text);
        rows.sort_by(|a, b| {
            let ord = match self.sort_column {
                SortColumn::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
                SortColumn::Instances => a.pids.len().cmp(&b.pids.len()),
                SortColumn::Memory => a.memory_kb.cmp(&b.memory_kb),
                SortColumn::Status => a.status.cmp(&b.status),
            };
            if self.sort_descending {
                ord.reverse()
            } else {
                ord
            }
        });

        let text_sz = 16.0;
        let row_height = 30.0;

        let mut table_builder = TableBuilder::new(ui)
            .striped(true)
            .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
            .column(Column::remainder()) // Name
            .column(Column::exact(90.0)) // Instances
            .column(Column::exact(110.0)) // Memory
            .column(Column::exact(110.0)); // Status
        if self.show_pids {
            table_builder = table_builder.column(Column::exact(160.0));
        }

        table_builder
            .header(row_height, |mut header| {
                header.col(|ui| self.sort_header(ui, "Name", SortColumn::Name));
                header.col(|ui| self.sort_header(ui, "Instances", SortColumn::Instances));
                header.col(|ui| self.sort_header(ui, "Memory", SortColumn::Memory));
                header.col(|ui| self.sort_header(ui, "Status", SortColumn::Status));
                if self.show_pids {
                    header.col(|ui| {
                        ui.label(egui::RichText::new("PIDs").strong().size(15.0));
                    });
                }
            })
            .body(|body| {
                body.rows(row_height, rows.len(), |mut row| {
                    let g = &rows[row.index()];

                    row.col(|ui| {
                        ui.label(egui::RichText::new(g.display_name()).size(text_sz))
                            .on_hover_text(format!("{}\nPIDs: {}", g.name, join_pids(&g.pids)));
                    });
                    row.col(|ui| {
                        ui.label(egui::RichText::new(g.pids.len().to_string()).size(text_sz));
                    });
                    row.col(|ui| {
                        ui.label(
                            egui::RichText::new(format!("{:.1} MB", g.memory_kb as f64 / 1024.0))
                                .size(text_sz),
                        );
                    });
                    row.col(|ui| {
                        ui.label(
                            egui::RichText::new(g.status.label())
                                .size(text_sz)
                                .color(g.status.color()),
                        );
                    });
                    if self.show_pids {
                        row.col(|ui| {
                            ui.label(egui::RichText::new(join_pids(&g.pids)).monospace());
                        });
                    }
                });
            });

        rows.len()
    }

    fn sort_header(&mut self, ui: &mut egui::Ui, title: &str, col: SortColumn) {
        let active = self.sort_column == col;
        let arrow = if !active {
            ""
        } else if self.sort_descending {
            " ↓"
        } else {
            " ↑"
        };
        let btn = egui::Button::new(
            egui::RichText::new(format!("{title}{arrow}"))
                .strong()
                .size(15.0),
        )
        .frame(false);

        if ui.add(btn).clicked() {
            if active {
                self.sort_descending = !self.sort_descending;
            } else {
                self.sort_column = col;
                self.sort_descending = false;
            }
        }
    }
}

fn join_pids(pids: &[u32]) -> String {
    pids.iter().map(u32::to_string).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, pid: u32, memory_kb: u64) -> ProcessEntry {
        ProcessEntry {
            name: name.to_string(),
            pid,
            session_name: "Console".to_string(),
            session_number: 1,
            memory_kb,
        }
    }

    #[test]
    fn groups_instances_and_decorates_duplicates() {
        let processes = vec![
            entry("chrome.exe", 1, 100),
            entry("chrome.exe", 2, 200),
            entry("notepad.exe", 3, 50),
        ];
        let groups = group_processes(&processes, None, &ProcessSet::new());

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].display_name(), "chrome.exe (2)");
        assert_eq!(groups[0].memory_kb, 300);
        assert_eq!(groups[1].display_name(), "notepad.exe");
        assert_eq!(groups[1].status, RowStatus::Unknown);
    }

    #[test]
    fn status_prefers_protected_over_kept() {
        let processes = vec![
            entry("svchost.exe", 1, 1),
            entry("chrome.exe", 2, 1),
            entry("game.exe", 3, 1),
        ];
        let kept: ProcessSet = ["chrome.exe", "svchost.exe"].into_iter().collect();
        let protected: ProcessSet = ["svchost.exe"].into_iter().collect();
        let groups = group_processes(&processes, Some(&kept), &protected);

        let status = |name: &str| groups.iter().find(|g| g.name == name).map(|g| g.status);
        assert_eq!(status("svchost.exe"), Some(RowStatus::Protected));
        assert_eq!(status("chrome.exe"), Some(RowStatus::Kept));
        assert_eq!(status("game.exe"), Some(RowStatus::Extra));
    }

    #[test]
    fn search_matches_names_and_pids() {
        let processes = vec![entry("Chrome.exe", 4242, 1), entry("notepad.exe", 7, 1)];
        let groups = group_processes(&processes, None, &ProcessSet::new());
        assert_eq!(filter_groups(&groups, "chrome").len(), 1);
        assert_eq!(filter_groups(&groups, "424").len(), 1);
        assert_eq!(filter_groups(&groups, "").len(), 2);
    }
}
