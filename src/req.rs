use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

/// Upper bound on a request body; ledger payloads are small JSON objects.
const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, PartialEq)]
pub enum Method {
    GET,
    POST,
}

impl TryFrom<&str> for Method {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, anyhow::Error> {
        match value {
            "GET" => Ok(Method::GET),
            "POST" => Ok(Method::POST),
            _ => Err(anyhow::anyhow!("Method not supported")),
        }
    }
}

pub struct Request {
    pub method: Method,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl Request {
    /// Reads one HTTP/1.1 request: the head up to the blank line, then
    /// `content-length` bytes of body.
    pub async fn new<Reader>(reader: Reader) -> Result<Self>
    where
        Reader: AsyncRead + Unpin,
    {
        let mut reader = BufReader::new(reader);

        // Method and path
        let mut first = String::new();
        reader.read_line(&mut first).await.context("Headline Error")?;
        let mut request_parts = first.split_whitespace();
        let method: Method = request_parts
            .next()
            .ok_or(anyhow::anyhow!("missing method"))
            .and_then(TryInto::try_into)
            .context("Missing Method")?;
        let path = request_parts.next().context("No Path")?.to_string();

        // Headers
        let mut headers = HashMap::new();
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await? == 0 {
                break;
            }
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some((k, v)) = line.split_once(':') {
                headers.insert(k.trim().to_lowercase(), v.trim().to_string());
            }
        }

        // Body
        let length = match headers.get("content-length") {
            Some(value) => value.parse::<usize>().context("Bad Content-Length")?,
            None => 0,
        };
        if length > MAX_BODY_BYTES {
            bail!("Body too large: {} bytes", length);
        }
        let mut body = vec![0; length];
        reader.read_exact(&mut body).await.context("Truncated Body")?;

        Ok(Request {
            method,
            path,
            headers,
            body: String::from_utf8(body).context("Body is not UTF-8")?,
        })
    }
}
