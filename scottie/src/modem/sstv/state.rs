use crate::modem::sstv::image::Channel;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncKind {
    /// Once per frame, right after the VIS header.
    Vertical,
    /// At the start of every line.
    Horizontal,
}

/// Decoder state. `row` is the image row the upcoming line will be written to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum State {
    #[default]
    AwaitingVis,
    AwaitingSync {
        row: usize,
        kind: SyncKind,
    },
    AwaitingPorch {
        row: usize,
        kind: SyncKind,
    },
    DecodingLine {
        row: usize,
        channel: Channel,
    },
}

impl State {
    /// The state after the current one completed.
    pub fn next(self, num_lines: usize) -> Self {
        match self {
            State::AwaitingVis => {
                State::AwaitingSync {
                    row: 0,
                    kind: SyncKind::Vertical,
                }
            }
            State::AwaitingSync { row, kind } => State::AwaitingPorch { row, kind },
            State::AwaitingPorch {
                row,
                kind: SyncKind::Vertical,
            } => {
                State::AwaitingSync {
                    row,
                    kind: SyncKind::Horizontal,
                }
            }
            State::AwaitingPorch {
                row,
                kind: SyncKind::Horizontal,
            } => {
                State::DecodingLine {
                    row,
                    channel: Channel::default(),
                }
            }
            State::DecodingLine { row, channel } => {
                if let Some(channel) = channel.next() {
                    State::DecodingLine { row, channel }
                }
                else if row + 1 >= num_lines {
                    State::AwaitingVis
                }
                else {
                    State::AwaitingSync {
                        row: row + 1,
                        kind: SyncKind::Horizontal,
                    }
                }
            }
        }
    }

    #[inline]
    pub fn row(&self) -> Option<usize> {
        match self {
            State::AwaitingVis => None,
            State::AwaitingSync { row, .. }
            | State::AwaitingPorch { row, .. }
            | State::DecodingLine { row, .. } => Some(*row),
        }
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        !matches!(self, State::AwaitingVis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(num_lines: usize) -> Vec<State> {
        let mut states = vec![State::AwaitingVis];
        loop {
            let next = states[states.len() - 1].next(num_lines);
            if next == State::AwaitingVis {
                break;
            }
            states.push(next);
        }
        states
    }

    #[test]
    fn frame_walks_through_all_lines() {
        let states = walk(2);
        assert_eq!(
            states,
            [
                State::AwaitingVis,
                State::AwaitingSync {
                    row: 0,
                    kind: SyncKind::Vertical
                },
                State::AwaitingPorch {
                    row: 0,
                    kind: SyncKind::Vertical
                },
                State::AwaitingSync {
                    row: 0,
                    kind: SyncKind::Horizontal
                },
                State::AwaitingPorch {
                    row: 0,
                    kind: SyncKind::Horizontal
                },
                State::DecodingLine {
                    row: 0,
                    channel: Channel::Green
                },
                State::DecodingLine {
                    row: 0,
                    channel: Channel::Blue
                },
                State::DecodingLine {
                    row: 0,
                    channel: Channel::Red
                },
                State::AwaitingSync {
                    row: 1,
                    kind: SyncKind::Horizontal
                },
                State::AwaitingPorch {
                    row: 1,
                    kind: SyncKind::Horizontal
                },
                State::DecodingLine {
                    row: 1,
                    channel: Channel::Green
                },
                State::DecodingLine {
                    row: 1,
                    channel: Channel::Blue
                },
                State::DecodingLine {
                    row: 1,
                    channel: Channel::Red
                },
            ]
        );
    }

    #[test]
    fn rows_strictly_increase() {
        let rows = walk(256)
            .iter()
            .filter_map(|state| {
                match state {
                    State::DecodingLine {
                        row,
                        channel: Channel::Red,
                    } => Some(*row),
                    _ => None,
                }
            })
            .collect::<Vec<usize>>();
        assert_eq!(rows, (0..256).collect::<Vec<usize>>());
    }
}
