use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::capacity::TicketConfig;
use crate::engine::TicketNumbers;
use crate::model::{Command, RegistrationId, Role, Submission, TicketKey};
use crate::strategy::Strategy;

/// Errors that can occur when reading commands or writing numbers
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("failed to open '{path}': {source}")]
    Open { path: String, source: csv::Error },

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized command type '{row_type}'")]
    UnrecognizedType { line: usize, row_type: String },

    #[error("line {line}: {row_type} missing {field}")]
    MissingField {
        line: usize,
        row_type: String,
        field: &'static str,
    },

    #[error("line {line}: unrecognized strategy '{strategy}'")]
    UnrecognizedStrategy { line: usize, strategy: String },

    #[error("failed to write csv row: {0}")]
    Write(#[source] csv::Error),

    #[error("failed to flush csv output: {0}")]
    Flush(#[from] io::Error),
}

#[derive(Debug, Deserialize)]
struct InputRow {
    r#type: String,
    ticket: TicketKey,
    id: Option<RegistrationId>,
    role: Option<Role>,
    partner: Option<RegistrationId>,
    capacity: Option<u32>,
    ratio: Option<f64>,
    allow_first: Option<u32>,
    strategy: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutputRow {
    ticket: TicketKey,
    accepted: u32,
    remaining: u32,
    leaders: u32,
    leaders_waiting: u32,
    followers: u32,
    followers_waiting: u32,
    couples: u32,
    couples_waiting: u32,
}

/// Read commands from a csv file
pub fn read_commands(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<Command, CsvError>>, CsvError> {
    let path = path.as_ref();
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|source| CsvError::Open {
            path: path.display().to_string(),
            source,
        })?;

    Ok(reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            row.into_command(line)
        }))
}

impl InputRow {
    fn into_command(self, line: usize) -> Result<Command, CsvError> {
        let missing = |field| CsvError::MissingField {
            line,
            row_type: self.r#type.clone(),
            field,
        };

        match self.r#type.as_str() {
            "ticket" => {
                let capacity = self.capacity.ok_or_else(|| missing("capacity"))?;
                let ratio = self.ratio.ok_or_else(|| missing("ratio"))?;
                let strategy = match self.strategy.as_deref() {
                    None | Some("threshold") => Strategy::Threshold,
                    Some("probabilistic") => Strategy::probabilistic(),
                    Some(other) => {
                        return Err(CsvError::UnrecognizedStrategy {
                            line,
                            strategy: other.to_string(),
                        });
                    }
                };

                let mut config = TicketConfig::new(capacity, ratio).with_strategy(strategy);
                config.allow_first = self.allow_first;
                Ok(Command::Configure {
                    ticket: self.ticket,
                    config,
                })
            }
            "register" | "admit" => {
                let id = self.id.ok_or_else(|| missing("id"))?;
                let role = self.role.ok_or_else(|| missing("role"))?;
                let submission = match role {
                    Role::Couple => Submission::Couple {
                        id,
                        partner: self.partner.ok_or_else(|| missing("partner"))?,
                        role: Role::Leader,
                    },
                    role => Submission::Solo { id, role },
                };

                if self.r#type == "admit" {
                    Ok(Command::Admit {
                        ticket: self.ticket,
                        submission,
                    })
                } else {
                    Ok(Command::Register {
                        ticket: self.ticket,
                        submission,
                    })
                }
            }
            "confirm" => Ok(Command::Confirm {
                id: self.id.ok_or_else(|| missing("id"))?,
                ticket: self.ticket,
            }),
            "cancel" => Ok(Command::Cancel {
                id: self.id.ok_or_else(|| missing("id"))?,
                ticket: self.ticket,
            }),
            "pair" => {
                let id = self.id.ok_or_else(|| missing("id"))?;
                let partner = self.partner.ok_or_else(|| missing("partner"))?;
                Ok(Command::Pair {
                    ticket: self.ticket,
                    id,
                    candidates: vec![partner],
                })
            }
            "balance" => Ok(Command::Balance {
                ticket: self.ticket,
            }),
            other => Err(CsvError::UnrecognizedType {
                line,
                row_type: other.to_string(),
            }),
        }
    }
}

/// Write ticket numbers to `writer` in csv format
pub fn write_numbers_to(
    writer: impl io::Write,
    numbers: impl IntoIterator<Item = (TicketKey, TicketNumbers)>,
) -> Result<(), CsvError> {
    let mut writer = csv::Writer::from_writer(writer);

    for (ticket, numbers) in numbers {
        let leaders = numbers.role(Role::Leader);
        let followers = numbers.role(Role::Follower);
        let couples = numbers.role(Role::Couple);
        let row = OutputRow {
            ticket,
            accepted: numbers.accepted,
            remaining: numbers.remaining,
            leaders: leaders.accepted,
            leaders_waiting: leaders.waiting,
            followers: followers.accepted,
            followers_waiting: followers.waiting,
            couples: couples.accepted,
            couples_waiting: couples.waiting,
        };
        writer.serialize(&row).map_err(CsvError::Write)?;
    }

    writer.flush()?;
    Ok(())
}

/// Write ticket numbers to stdout in csv format
pub fn write_numbers(
    numbers: impl IntoIterator<Item = (TicketKey, TicketNumbers)>,
) -> Result<(), CsvError> {
    let stdout = io::stdout();
    write_numbers_to(stdout.lock(), numbers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TicketBook;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "type,ticket,id,role,partner,capacity,ratio,allow_first,strategy\n";

    fn write_csv(rows: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(HEADER.as_bytes()).unwrap();
        file.write_all(rows.as_bytes()).unwrap();
        file
    }

    fn read_all(rows: &str) -> Vec<Result<Command, CsvError>> {
        let file = write_csv(rows);
        read_commands(file.path()).unwrap().collect()
    }

    fn read_one(rows: &str) -> Command {
        let results = read_all(rows);
        assert_eq!(results.len(), 1);
        results.into_iter().next().unwrap().unwrap()
    }

    #[test]
    fn read_ticket() {
        let command = read_one("ticket,lindy,,,,10,1.5,4,\n");
        match command {
            Command::Configure { ticket, config } => {
                assert_eq!(ticket, "lindy");
                assert_eq!(config, TicketConfig::new(10, 1.5).with_allow_first(4));
            }
            _ => panic!("expected configure"),
        }
    }

    #[test]
    fn read_probabilistic_ticket() {
        let command = read_one("ticket,lindy,,,,30,1.5,,probabilistic\n");
        match command {
            Command::Configure { config, .. } => {
                assert_eq!(config.strategy, Strategy::probabilistic());
                assert_eq!(config.allow_first, None);
            }
            _ => panic!("expected configure"),
        }
    }

    #[test]
    fn read_solo_registration() {
        let command = read_one("register,lindy,7,follower,,,,,\n");
        match command {
            Command::Register { ticket, submission } => {
                assert_eq!(ticket, "lindy");
                assert_eq!(
                    submission,
                    Submission::Solo {
                        id: 7,
                        role: Role::Follower
                    }
                );
            }
            _ => panic!("expected register"),
        }
    }

    #[test]
    fn read_couple_admission() {
        let command = read_one("admit,lindy,1,couple,2,,,,\n");
        match command {
            Command::Admit { submission, .. } => {
                assert_eq!(
                    submission,
                    Submission::Couple {
                        id: 1,
                        partner: 2,
                        role: Role::Leader
                    }
                );
            }
            _ => panic!("expected admit"),
        }
    }

    #[test]
    fn read_lifecycle_rows() {
        let results = read_all(
            "confirm,lindy,1,,,,,,\ncancel,lindy,2,,,,,,\npair,lindy,3,,4,,,,\nbalance,lindy,,,,,,,\n",
        );
        let commands: Vec<_> = results.into_iter().map(Result::unwrap).collect();

        assert!(matches!(commands[0], Command::Confirm { id: 1, .. }));
        assert!(matches!(commands[1], Command::Cancel { id: 2, .. }));
        match &commands[2] {
            Command::Pair { id, candidates, .. } => {
                assert_eq!(*id, 3);
                assert_eq!(candidates, &vec![4]);
            }
            _ => panic!("expected pair"),
        }
        assert!(matches!(commands[3], Command::Balance { .. }));
    }

    #[test]
    fn read_with_whitespace_and_short_rows() {
        let results = read_all("admit, lindy, 1, leader\nbalance, lindy\n");
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(Result::is_ok));
    }

    #[test]
    fn read_returns_error_for_unknown_type() {
        let results = read_all("refund,lindy,1,,,,,,\n");
        let err = results[0].as_ref().unwrap_err();
        assert!(matches!(err, CsvError::UnrecognizedType { line: 2, .. }));
    }

    #[test]
    fn read_returns_error_for_missing_fields() {
        let results = read_all("ticket,lindy,,,,10,,,\nadmit,lindy,1,couple,,,,,\nconfirm,lindy,,,,,,,\n");
        assert!(matches!(
            results[0].as_ref().unwrap_err(),
            CsvError::MissingField { line: 2, field: "ratio", .. }
        ));
        assert!(matches!(
            results[1].as_ref().unwrap_err(),
            CsvError::MissingField { line: 3, field: "partner", .. }
        ));
        assert!(matches!(
            results[2].as_ref().unwrap_err(),
            CsvError::MissingField { line: 4, field: "id", .. }
        ));
    }

    #[test]
    fn read_returns_error_for_bad_values() {
        let results = read_all("admit,lindy,1,dancer,,,,,\nticket,lindy,,,,10,1.5,,random\n");
        assert!(matches!(
            results[0].as_ref().unwrap_err(),
            CsvError::Parse { line: 2, .. }
        ));
        assert!(matches!(
            results[1].as_ref().unwrap_err(),
            CsvError::UnrecognizedStrategy { line: 3, .. }
        ));
    }

    #[test]
    fn read_missing_file_is_an_error() {
        let result = read_commands("/nonexistent/commands.csv");
        assert!(matches!(result, Err(CsvError::Open { .. })));
    }

    #[test]
    fn write_numbers_as_rows() {
        let mut book = TicketBook::new("lindy", TicketConfig::new(4, 1.5)).unwrap();
        book.admit(Submission::Couple {
            id: 1,
            partner: 2,
            role: Role::Leader,
        })
        .unwrap();
        book.admit(Submission::Solo {
            id: 3,
            role: Role::Leader,
        })
        .unwrap();
        book.admit(Submission::Couple {
            id: 4,
            partner: 5,
            role: Role::Leader,
        })
        .unwrap();

        let mut out = Vec::new();
        write_numbers_to(&mut out, [("lindy".to_string(), book.numbers().unwrap())]).unwrap();

        let out = String::from_utf8(out).unwrap();
        assert_eq!(
            out,
            "ticket,accepted,remaining,leaders,leaders_waiting,followers,followers_waiting,couples,couples_waiting\n\
             lindy,3,1,2,1,1,1,1,1\n"
        );
    }
}
