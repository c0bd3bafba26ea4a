//! memcached text protocol: command encoding and reply parsing.

use nscache_core::{Error, Result};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Longest key memcached accepts.
pub const MAX_KEY_LENGTH: usize = 250;

/// Largest value accepted in a retrieval reply.
pub const MAX_VALUE_LENGTH: usize = 128 * 1024 * 1024;

/// Relative expiry times above this are read by the server as unix timestamps.
const MAX_RELATIVE_EXPTIME: u64 = 60 * 60 * 24 * 30;

/// The server parses exptime as a signed 32-bit integer.
const MAX_EXPTIME: u64 = i32::MAX as u64;

/// Reject keys the server would refuse or misparse.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidKey("key is empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(Error::InvalidKey(format!(
            "key is {} bytes, limit is {}",
            key.len(),
            MAX_KEY_LENGTH
        )));
    }
    if key.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(Error::InvalidKey(format!(
            "key {:?} contains whitespace or control characters",
            key
        )));
    }
    Ok(())
}

/// Convert a TTL in seconds to the exptime field memcached expects.
///
/// Deadlines the server cannot represent are sent as `0`, i.e. no expiry.
pub fn exptime(ttl_secs: u64) -> u64 {
    if ttl_secs <= MAX_RELATIVE_EXPTIME {
        return ttl_secs;
    }
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    match now.saturating_add(ttl_secs) {
        deadline if deadline > MAX_EXPTIME => 0,
        deadline => deadline,
    }
}

/// Map a socket failure to a transport error.
pub(crate) fn network_error(e: std::io::Error) -> Error {
    Error::Network(format!("socket error: {}", e))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreVerb {
    Set,
    Add,
}

impl StoreVerb {
    fn as_str(self) -> &'static str {
        match self {
            StoreVerb::Set => "set",
            StoreVerb::Add => "add",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaVerb {
    Incr,
    Decr,
}

impl DeltaVerb {
    fn as_str(self) -> &'static str {
        match self {
            DeltaVerb::Incr => "incr",
            DeltaVerb::Decr => "decr",
        }
    }
}

/// A request to a single server.
#[derive(Debug, Clone)]
pub enum Command<'a> {
    Get {
        key: &'a str,
    },
    Store {
        verb: StoreVerb,
        key: &'a str,
        flags: u32,
        exptime: u64,
        data: &'a [u8],
    },
    Delta {
        verb: DeltaVerb,
        key: &'a str,
        amount: u64,
    },
    Delete {
        key: &'a str,
    },
    Version,
    FlushAll,
}

impl Command<'_> {
    /// Serialize the command, payload included.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Command::Get { key } => format!("get {}\r\n", key).into_bytes(),
            Command::Store {
                verb,
                key,
                flags,
                exptime,
                data,
            } => {
                let mut buf = format!(
                    "{} {} {} {} {}\r\n",
                    verb.as_str(),
                    key,
                    flags,
                    exptime,
                    data.len()
                )
                .into_bytes();
                buf.extend_from_slice(data);
                buf.extend_from_slice(b"\r\n");
                buf
            }
            Command::Delta { verb, key, amount } => {
                format!("{} {} {}\r\n", verb.as_str(), key, amount).into_bytes()
            }
            Command::Delete { key } => format!("delete {}\r\n", key).into_bytes(),
            Command::Version => b"version\r\n".to_vec(),
            Command::FlushAll => b"flush_all\r\n".to_vec(),
        }
    }
}

/// One item of a retrieval reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub key: String,
    pub flags: u32,
    pub data: Vec<u8>,
}

/// A parsed server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Values(Vec<Item>),
    Stored,
    NotStored,
    Exists,
    NotFound,
    Deleted,
    Number(u64),
    Version(String),
    Ok,
    ClientError(String),
    ServerError(String),
}

/// Read one complete reply.
pub async fn read_reply<R>(reader: &mut R) -> Result<Reply>
where
    R: AsyncBufRead + Unpin,
{
    let mut items = Vec::new();
    loop {
        let line = read_line(reader).await?;

        if let Some(header) = line.strip_prefix("VALUE ") {
            items.push(read_item(reader, header).await?);
            continue;
        }
        if !items.is_empty() && line != "END" {
            return Err(Error::Protocol(format!("unexpected line in value list: {}", line)));
        }

        return match line.as_str() {
            "END" => Ok(Reply::Values(items)),
            "STORED" => Ok(Reply::Stored),
            "NOT_STORED" => Ok(Reply::NotStored),
            "EXISTS" => Ok(Reply::Exists),
            "NOT_FOUND" => Ok(Reply::NotFound),
            "DELETED" => Ok(Reply::Deleted),
            "OK" => Ok(Reply::Ok),
            "ERROR" => Err(Error::Protocol("server rejected command".to_string())),
            other => parse_status(other),
        };
    }
}

fn parse_status(line: &str) -> Result<Reply> {
    if let Some(msg) = line.strip_prefix("CLIENT_ERROR") {
        return Ok(Reply::ClientError(msg.trim().to_string()));
    }
    if let Some(msg) = line.strip_prefix("SERVER_ERROR") {
        return Ok(Reply::ServerError(msg.trim().to_string()));
    }
    if let Some(version) = line.strip_prefix("VERSION ") {
        return Ok(Reply::Version(version.to_string()));
    }
    line.parse::<u64>()
        .map(Reply::Number)
        .map_err(|_| Error::Protocol(format!("unrecognised reply: {}", line)))
}

async fn read_item<R>(reader: &mut R, header: &str) -> Result<Item>
where
    R: AsyncBufRead + Unpin,
{
    let mut parts = header.split(' ');
    let (Some(key), Some(flags), Some(len)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(Error::Protocol(format!("malformed VALUE header: {}", header)));
    };
    let flags: u32 = flags
        .parse()
        .map_err(|_| Error::Protocol(format!("bad flags in VALUE header: {}", header)))?;
    let len: usize = len
        .parse()
        .map_err(|_| Error::Protocol(format!("bad length in VALUE header: {}", header)))?;
    let framed = len
        .checked_add(2)
        .filter(|_| len <= MAX_VALUE_LENGTH)
        .ok_or_else(|| Error::Protocol(format!("value too large in VALUE header: {}", header)))?;

    let mut data = vec![0u8; framed];
    reader.read_exact(&mut data).await.map_err(network_error)?;
    if !data.ends_with(b"\r\n") {
        return Err(Error::Protocol(format!("value for {} not terminated", key)));
    }
    data.truncate(len);

    Ok(Item {
        key: key.to_string(),
        flags,
        data,
    })
}

async fn read_line<R>(reader: &mut R) -> Result<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let n = reader
        .read_until(b'\n', &mut buf)
        .await
        .map_err(network_error)?;
    if n == 0 {
        return Err(Error::Network("connection closed by server".to_string()));
    }
    if !buf.ends_with(b"\r\n") {
        return Err(Error::Protocol("reply line not terminated".to_string()));
    }
    buf.truncate(buf.len() - 2);
    String::from_utf8(buf).map_err(|_| Error::Protocol("reply line is not UTF-8".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn parse(raw: &[u8]) -> Result<Reply> {
        let mut reader = raw;
        read_reply(&mut reader).await
    }

    #[test]
    fn test_encode_commands() {
        assert_eq!(Command::Get { key: "k" }.encode(), b"get k\r\n");
        assert_eq!(
            Command::Store {
                verb: StoreVerb::Add,
                key: "__ns_users",
                flags: 0,
                exptime: 0,
                data: b"1",
            }
            .encode(),
            b"add __ns_users 0 0 1\r\n1\r\n"
        );
        assert_eq!(
            Command::Delta {
                verb: DeltaVerb::Decr,
                key: "n",
                amount: 5
            }
            .encode(),
            b"decr n 5\r\n"
        );
        assert_eq!(Command::Delete { key: "k" }.encode(), b"delete k\r\n");
    }

    #[tokio::test]
    async fn test_parse_values() {
        let reply = parse(b"VALUE a 0 3\r\nfoo\r\nVALUE b 8 2\r\nhi\r\nEND\r\n")
            .await
            .unwrap();
        assert_eq!(
            reply,
            Reply::Values(vec![
                Item {
                    key: "a".into(),
                    flags: 0,
                    data: b"foo".to_vec()
                },
                Item {
                    key: "b".into(),
                    flags: 8,
                    data: b"hi".to_vec()
                },
            ])
        );
    }

    #[tokio::test]
    async fn test_parse_value_containing_crlf() {
        let reply = parse(b"VALUE a 0 4\r\n\r\n\r\n\r\nEND\r\n").await.unwrap();
        assert_eq!(
            reply,
            Reply::Values(vec![Item {
                key: "a".into(),
                flags: 0,
                data: b"\r\n\r\n".to_vec()
            }])
        );
    }

    #[tokio::test]
    async fn test_parse_status_lines() {
        assert_eq!(parse(b"END\r\n").await.unwrap(), Reply::Values(vec![]));
        assert_eq!(parse(b"STORED\r\n").await.unwrap(), Reply::Stored);
        assert_eq!(parse(b"NOT_STORED\r\n").await.unwrap(), Reply::NotStored);
        assert_eq!(parse(b"NOT_FOUND\r\n").await.unwrap(), Reply::NotFound);
        assert_eq!(parse(b"DELETED\r\n").await.unwrap(), Reply::Deleted);
        assert_eq!(parse(b"42\r\n").await.unwrap(), Reply::Number(42));
        assert_eq!(
            parse(b"VERSION 1.6.21\r\n").await.unwrap(),
            Reply::Version("1.6.21".into())
        );
        assert_eq!(
            parse(b"CLIENT_ERROR cannot increment or decrement non-numeric value\r\n")
                .await
                .unwrap(),
            Reply::ClientError("cannot increment or decrement non-numeric value".into())
        );
        assert_eq!(
            parse(b"SERVER_ERROR out of memory\r\n").await.unwrap(),
            Reply::ServerError("out of memory".into())
        );
    }

    #[tokio::test]
    async fn test_parse_errors() {
        assert!(matches!(parse(b"ERROR\r\n").await, Err(Error::Protocol(_))));
        assert!(matches!(parse(b"BOGUS\r\n").await, Err(Error::Protocol(_))));
        assert!(matches!(parse(b"STORED\n").await, Err(Error::Protocol(_))));
        assert!(matches!(parse(b"").await, Err(Error::Network(_))));
        assert!(matches!(
            parse(b"VALUE a 0 10\r\nshort\r\n").await,
            Err(Error::Network(_))
        ));
    }

    #[tokio::test]
    async fn test_oversized_value_header_is_rejected() {
        let header = format!("VALUE a 0 {}\r\n", usize::MAX);
        assert!(matches!(
            parse(header.as_bytes()).await,
            Err(Error::Protocol(_))
        ));

        let header = format!("VALUE a 0 {}\r\n", MAX_VALUE_LENGTH + 1);
        assert!(matches!(
            parse(header.as_bytes()).await,
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("__users_3_profile:42").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("has space").is_err());
        assert!(validate_key("tab\there").is_err());
        assert!(validate_key(&"k".repeat(MAX_KEY_LENGTH)).is_ok());
        assert!(validate_key(&"k".repeat(MAX_KEY_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_exptime() {
        assert_eq!(exptime(0), 0);
        assert_eq!(exptime(3600), 3600);
        assert!(exptime(MAX_RELATIVE_EXPTIME + 1) > 1_600_000_000);
    }

    #[test]
    fn test_exptime_beyond_server_range_means_no_expiry() {
        assert_eq!(exptime(u64::MAX - 10), 0);
        assert_eq!(exptime(u64::MAX), 0);
        assert_eq!(exptime(MAX_EXPTIME), 0);
    }
}
