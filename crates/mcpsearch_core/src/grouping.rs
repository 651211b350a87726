/// Markup steps emitted while walking an ordered appearance stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupEvent {
    /// Table start with the column header; emitted once, before the first group.
    OpenTable,
    /// Spacer between two appendix groups.
    Separator,
    /// Header row of a new appendix group.
    GroupHeader,
    DataRow { striped: bool },
    /// Terminal event of an empty stream.
    NotFound,
    /// Terminal event of a non-empty stream.
    CloseTable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum GroupState {
    Empty,
    InGroup { appendix: String, row_color: bool },
    Done,
}

/// Tracks appendix groups and row striping. Rows must arrive sorted by
/// appendix; an appendix that reappears later opens a new group.
#[derive(Debug)]
pub struct RowGrouper {
    state: GroupState,
}

impl Default for RowGrouper {
    fn default() -> Self {
        Self::new()
    }
}

impl RowGrouper {
    pub fn new() -> Self {
        Self {
            state: GroupState::Empty,
        }
    }

    /// Events for the next row, in emission order. Rows after `finish` yield nothing.
    pub fn push(&mut self, appendix: &str) -> Vec<GroupEvent> {
        let mut events = Vec::with_capacity(3);
        match &mut self.state {
            GroupState::Done => return events,
            GroupState::Empty => {
                events.push(GroupEvent::OpenTable);
                events.push(GroupEvent::GroupHeader);
                self.state = GroupState::InGroup {
                    appendix: appendix.to_string(),
                    row_color: false,
                };
            }
            GroupState::InGroup {
                appendix: current,
                row_color,
            } => {
                if current != appendix {
                    events.push(GroupEvent::Separator);
                    events.push(GroupEvent::GroupHeader);
                    *current = appendix.to_string();
                    *row_color = false;
                }
            }
        }

        if let GroupState::InGroup { row_color, .. } = &mut self.state {
            events.push(GroupEvent::DataRow { striped: *row_color });
            *row_color = !*row_color;
        }
        events
    }

    /// Terminal event; `None` when the stream was already finished.
    pub fn finish(&mut self) -> Option<GroupEvent> {
        let event = match self.state {
            GroupState::Empty => GroupEvent::NotFound,
            GroupState::InGroup { .. } => GroupEvent::CloseTable,
            GroupState::Done => return None,
        };
        self.state = GroupState::Done;
        Some(event)
    }

    #[cfg(test)]
    fn current_appendix(&self) -> Option<&str> {
        match &self.state {
            GroupState::InGroup { appendix, .. } => Some(appendix),
            _ => None,
        }
    }

    #[cfg(test)]
    fn header_emitted(&self) -> bool {
        !matches!(self.state, GroupState::Empty)
    }
}
