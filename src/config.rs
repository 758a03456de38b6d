use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// What the server replies when a client sends a command name it doesn't know.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownCommandReply {
    /// An empty status line (`+\r\n`).
    Blank,
    /// `-ERR unknown command '<name>'`.
    Error,
}

impl UnknownCommandReply {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "blank" => Some(UnknownCommandReply::Blank),
            "error" => Some(UnknownCommandReply::Error),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UnknownCommandReply::Blank => "blank",
            UnknownCommandReply::Error => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub loglevel: String,
    // Persistence
    pub dir: String,
    pub appendfilename: String,
    // Pub/Sub
    pub mailbox_capacity: usize,
    pub unknown_command: UnknownCommandReply,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind: "127.0.0.1".to_string(),
            port: 6379,
            loglevel: "info".to_string(),
            dir: "data".to_string(),
            appendfilename: "database.aof".to_string(),
            mailbox_capacity: 100,
            unknown_command: UnknownCommandReply::Blank,
        }
    }
}

impl Config {
    pub fn from_args(args: &[String]) -> Self {
        let mut config = Config::default();
        let mut i = 0;
        while i < args.len() {
            let value = args.get(i + 1);
            match (args[i].as_str(), value) {
                ("--port", Some(v)) => {
                    if let Ok(p) = v.parse() {
                        config.port = p;
                    }
                    i += 1;
                }
                ("--bind", Some(v)) => {
                    config.bind = v.clone();
                    i += 1;
                }
                ("--dir", Some(v)) => {
                    config.dir = v.clone();
                    i += 1;
                }
                ("--appendfilename", Some(v)) => {
                    config.appendfilename = v.clone();
                    i += 1;
                }
                ("--mailbox-capacity", Some(v)) => {
                    if let Ok(n) = v.parse::<usize>()
                        && n > 0
                    {
                        config.mailbox_capacity = n;
                    }
                    i += 1;
                }
                ("--unknown-command", Some(v)) => {
                    if let Some(reply) = UnknownCommandReply::from_str(v) {
                        config.unknown_command = reply;
                    }
                    i += 1;
                }
                ("--loglevel", Some(v)) => {
                    config.loglevel = v.clone();
                    i += 1;
                }
                _ => {}
            }
            i += 1;
        }
        config
    }

    /// Location of the append-only log.
    pub fn aof_path(&self) -> PathBuf {
        PathBuf::from(&self.dir).join(&self.appendfilename)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

pub type SharedConfig = Arc<RwLock<Config>>;
