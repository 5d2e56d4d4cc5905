use {
    anyhow::{Context, Result},
    clap::Subcommand,
    revwatch_common::{LogRecord, RevocationRecord},
    revwatch_config::RevwatchConfig,
    revwatch_journal::read_tail,
    serde::Serialize,
};

#[derive(Subcommand)]
pub enum LogsAction {
    /// Show observed messages (only written with the `all` strategy).
    History {
        /// Number of most recent entries to show (0 shows everything).
        #[arg(long, short = 'n', default_value_t = 20)]
        last: usize,
        /// Print raw JSON lines.
        #[arg(long)]
        json: bool,
    },
    /// Show messages that were deleted for everyone.
    Revoked {
        /// Number of most recent entries to show (0 shows everything).
        #[arg(long, short = 'n', default_value_t = 20)]
        last: usize,
        /// Print raw JSON lines.
        #[arg(long)]
        json: bool,
    },
}

pub async fn handle_logs(action: &LogsAction, config: &RevwatchConfig) -> Result<()> {
    match action {
        LogsAction::History { last, json } => {
            let path = config.logging.history_path();
            let records: Vec<LogRecord> = read_tail(&path, limit(*last))
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            if records.is_empty() && !config.logging.strategy.logs_history() {
                eprintln!(
                    "No history at {} (strategy is {}, history is only kept with `all`).",
                    path.display(),
                    config.logging.strategy
                );
            }
            print_records(&records, *json, format_history)
        },
        LogsAction::Revoked { last, json } => {
            let path = config.logging.revocations_path();
            let records: Vec<RevocationRecord> = read_tail(&path, limit(*last))
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            if records.is_empty() {
                eprintln!("No deleted messages recorded at {}.", path.display());
            }
            print_records(&records, *json, format_revocation)
        },
    }
}

fn limit(last: usize) -> Option<usize> {
    (last > 0).then_some(last)
}

fn print_records<T: Serialize>(records: &[T], json: bool, format: fn(&T) -> String) -> Result<()> {
    for record in records {
        if json {
            println!("{}", serde_json::to_string(record)?);
        } else {
            println!("{}", format(record));
        }
    }
    Ok(())
}

fn format_history(record: &LogRecord) -> String {
    let media = if record.has_media { " [media]" } else { "" };
    format!(
        "{} {} ({}){media}: {}",
        record.timestamp.format("%Y-%m-%d %H:%M:%S"),
        record.chat_name,
        record.sender_number,
        record.content
    )
}

fn format_revocation(record: &RevocationRecord) -> String {
    let chat = record
        .chat_name
        .as_deref()
        .unwrap_or(record.sender_number.as_str());
    format!(
        "{} deleted by {} in {}: {}",
        record.deleted_at.format("%Y-%m-%d %H:%M:%S"),
        record.sender_number,
        chat,
        record.content
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, chrono::TimeZone, revwatch_common::UNKNOWN_SENDER};

    #[test]
    fn zero_means_everything() {
        assert_eq!(limit(0), None);
        assert_eq!(limit(5), Some(5));
    }

    #[test]
    fn degraded_revocation_prints_placeholder_sender() {
        let at = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let rec = RevocationRecord::degraded("B2", "gone", None, at);
        assert_eq!(
            format_revocation(&rec),
            format!("2024-05-01 12:00:00 deleted by {UNKNOWN_SENDER} in {UNKNOWN_SENDER}: gone")
        );
    }

    #[test]
    fn history_marks_media() {
        let rec = LogRecord {
            id: "A1".into(),
            timestamp: chrono::Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            sender_number: "15551234567".into(),
            chat_name: "Alice".into(),
            content: "look".into(),
            has_media: true,
            remote_chat_id: "15551234567@c.us".into(),
        };
        assert_eq!(
            format_history(&rec),
            "2024-05-01 12:00:00 Alice (15551234567) [media]: look"
        );
    }
}
