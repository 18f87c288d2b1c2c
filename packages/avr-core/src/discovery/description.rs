//! UPnP device description fetching.

use std::time::Duration;

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;

use super::types::{DiscoveryError, DiscoveryResult};

/// Resolves a LOCATION URL to the device's friendly name.
#[async_trait]
pub trait DescriptionFetcher: Send + Sync {
    /// `Ok(None)` when the document has no usable `friendlyName`.
    async fn fetch_friendly_name(&self, url: &str) -> DiscoveryResult<Option<String>>;
}

/// Fetches description documents over HTTP.
#[derive(Debug, Clone)]
pub struct HttpDescriptionFetcher {
    client: Client,
}

impl HttpDescriptionFetcher {
    /// Creates a fetcher with its own client and request timeout.
    pub fn new(timeout: Duration) -> DiscoveryResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DescriptionFetcher for HttpDescriptionFetcher {
    async fn fetch_friendly_name(&self, url: &str) -> DiscoveryResult<Option<String>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::HttpStatus(status.as_u16()));
        }
        let body = response.text().await?;
        parse_friendly_name(&body)
    }
}

/// Extracts the first non-empty `friendlyName` element.
pub fn parse_friendly_name(xml: &str) -> DiscoveryResult<Option<String>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"friendlyName" => {
                let raw = reader
                    .read_text(e.name())
                    .map_err(|e| DiscoveryError::Xml(e.to_string()))?;
                let text = quick_xml::escape::unescape(&raw)
                    .map_err(|e| DiscoveryError::Xml(e.to_string()))?;
                let name = text.trim();
                if !name.is_empty() {
                    return Ok(Some(name.to_string()));
                }
            }
            Ok(Event::Eof) => return Ok(None),
            Err(e) => return Err(DiscoveryError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTION: &str = r#"<?xml version="1.0"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <device>
    <deviceType>urn:schemas-denon-com:device:ACT-DenonAVR:1</deviceType>
    <friendlyName>Living Room &amp; Den</friendlyName>
    <manufacturer>Denon</manufacturer>
    <UDN>uuid:AB12</UDN>
  </device>
</root>"#;

    #[test]
    fn extracts_and_unescapes_friendly_name() {
        assert_eq!(
            parse_friendly_name(DESCRIPTION).unwrap(),
            Some("Living Room & Den".to_string())
        );
    }

    #[test]
    fn missing_or_empty_name_is_none() {
        assert_eq!(parse_friendly_name("<root><device/></root>").unwrap(), None);
        assert_eq!(
            parse_friendly_name("<root><friendlyName>  </friendlyName></root>").unwrap(),
            None
        );
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(parse_friendly_name("<root><friendlyName>Living Room").is_err());
    }

    /// Serves one HTTP response on a local port and returns its URL.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\n\
                 Content-Type: text/xml\r\n\
                 Content-Length: {}\r\n\
                 Connection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{addr}/upnp/desc/aios_device/aios_device.xml")
    }

    #[tokio::test]
    async fn http_fetch_reads_friendly_name() {
        let url = serve_once("200 OK", DESCRIPTION).await;
        let fetcher = HttpDescriptionFetcher::new(Duration::from_secs(5)).unwrap();
        assert_eq!(
            fetcher.fetch_friendly_name(&url).await.unwrap().as_deref(),
            Some("Living Room & Den")
        );
    }

    #[tokio::test]
    async fn http_error_status_is_reported() {
        let url = serve_once("404 Not Found", "").await;
        let fetcher = HttpDescriptionFetcher::new(Duration::from_secs(5)).unwrap();
        assert!(matches!(
            fetcher.fetch_friendly_name(&url).await,
            Err(DiscoveryError::HttpStatus(404))
        ));
    }
}
