use anyhow::Result;
use config::StoreConfig;
use store::{BincodeCodec, ChecksumCodec, RecordStore};

/// Record store used by the shell: one string per record, framed with a
/// checksum so corrupted bytes surface as errors instead of garbage.
pub type ShellStore = RecordStore<String, ChecksumCodec<BincodeCodec>>;

/// Result of executing one input line.
#[derive(Debug, PartialEq, Eq)]
pub enum Reply {
    Line(String),
    Empty,
    Exit,
}

pub struct Shell {
    store: ShellStore,
}

impl Shell {
    pub fn open(config: StoreConfig) -> Result<Self> {
        let store = RecordStore::open(config, ChecksumCodec::new(BincodeCodec))?;
        Ok(Self { store })
    }

    pub fn banner(&self) -> String {
        format!(
            "retstore started (name={}, dir={}, cursor={})",
            self.store.name(),
            self.store.config().base_dir.display(),
            self.store.write_cursor()
        )
    }

    #[cfg(test)]
    pub fn store(&self) -> &ShellStore {
        &self.store
    }

    /// Parses and runs one command. Failures are reported as `ERR ...` lines;
    /// only `EXIT`/`QUIT` end the session.
    pub fn execute(&self, line: &str) -> Reply {
        let line = line.trim();
        if line.is_empty() {
            return Reply::Empty;
        }

        let mut parts = line.splitn(3, ' ');
        let cmd = parts.next().unwrap_or("");

        let text = match cmd.to_uppercase().as_str() {
            "NEW" => match self.store.generate_ret_id() {
                Ok(id) => id.to_string(),
                Err(e) => format!("ERR new failed: {}", e),
            },
            "PEEK" => match self.store.peek_ret_id() {
                Ok(id) => id.to_string(),
                Err(e) => format!("ERR peek failed: {}", e),
            },
            "APPEND" => {
                let id = parts.next();
                let value = parts.next();
                match (id, value) {
                    (Some(id), Some(value)) => match parse_id(id) {
                        Ok(id) => match self.store.append(id, &value.to_string()) {
                            Ok(index) => format!("OK {}", index),
                            Err(e) => format!("ERR append failed: {}", e),
                        },
                        Err(msg) => msg,
                    },
                    _ => "ERR usage: APPEND id value".to_string(),
                }
            }
            "READ" => {
                let id = parts.next();
                let index = parts.next();
                match (id, index) {
                    (Some(id), Some(index)) => match (parse_id(id), index.trim().parse::<usize>()) {
                        (Ok(id), Ok(index)) => match self.store.read(id, index) {
                            Ok(value) => value,
                            Err(e) => format!("ERR read failed: {}", e),
                        },
                        (Err(msg), _) => msg,
                        (_, Err(_)) => format!("ERR invalid index: {}", index.trim()),
                    },
                    _ => "ERR usage: READ id index".to_string(),
                }
            }
            "COUNT" => match parts.next() {
                Some(id) => match parse_id(id) {
                    Ok(id) => match self.store.element_count(id) {
                        Ok(n) => n.to_string(),
                        Err(e) => format!("ERR count failed: {}", e),
                    },
                    Err(msg) => msg,
                },
                None => "ERR usage: COUNT id".to_string(),
            },
            "SYNC" => match self.store.checkpoint() {
                Ok(()) => "OK".to_string(),
                Err(e) => format!("ERR sync failed: {}", e),
            },
            "NUKE" => match self.store.nuke() {
                Ok(()) => "OK (nuked)".to_string(),
                Err(e) => format!("ERR nuke failed: {}", e),
            },
            "STATS" => format!("{:?}", self.store),
            "EXIT" | "QUIT" => return Reply::Exit,
            _ => "ERR unknown command".to_string(),
        };

        Reply::Line(text)
    }
}

fn parse_id(raw: &str) -> std::result::Result<u64, String> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| format!("ERR invalid stream id: {}", raw.trim()))
}
