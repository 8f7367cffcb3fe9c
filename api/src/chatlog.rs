//! Daily plain-text transcript of answered support turns.
//!
//! One file per local day, append-only. Logging is best-effort: a failed
//! write is reported once and the response still goes out.

use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct ChatLog {
    dir: PathBuf,
}

impl ChatLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn append(&self, intent: &str, table: &str, question: &str, answer: &str) {
        if let Err(e) = self.try_append(intent, table, question, answer) {
            warn!(error = %e, "chat log write failed");
        }
    }

    fn try_append(
        &self,
        intent: &str,
        table: &str,
        question: &str,
        answer: &str,
    ) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;

        let now = Local::now();
        let path = self
            .dir
            .join(format!("chat_log_{}.txt", now.format("%Y-%m-%d")));

        let entry = format!(
            "\n=== 채팅 로그 ===\n\
             시간: {}\n\
             의도: {}\n\
             테이블: {}\n\n\
             사용자 질문:\n{}\n\n\
             봇 답변:\n{}\n\n\
             {}\n",
            now.format("%Y-%m-%d %H:%M:%S"),
            intent,
            table,
            question,
            answer,
            "=".repeat(50),
        );

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?
            .write_all(entry.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appends_to_daily_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = ChatLog::new(dir.path());

        log.append("product_info", "products", "가격 알려줘", "19,000원입니다.");
        log.append("review_info", "reviews", "평점은?", "4.5점입니다.");

        let mut entries = fs::read_dir(dir.path()).unwrap();
        let file = entries.next().unwrap().unwrap();
        assert!(entries.next().is_none(), "both turns share the daily file");

        let name = file.file_name().into_string().unwrap();
        assert!(name.starts_with("chat_log_") && name.ends_with(".txt"));

        let body = fs::read_to_string(file.path()).unwrap();
        assert_eq!(body.matches("=== 채팅 로그 ===").count(), 2);
        assert!(body.contains("의도: product_info"));
        assert!(body.contains("테이블: reviews"));
        assert!(body.contains("가격 알려줘"));
    }
}
