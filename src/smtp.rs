//! Hand-written SMTP client used when no relay library is configured.
//!
//! One delivery attempt is one linear session: greeting, `EHLO`,
//! `STARTTLS`, then the plaintext connection is discarded and the same
//! host:port is re-dialed inside TLS, `EHLO` again, `AUTH LOGIN`,
//! envelope commands, `DATA`, `QUIT`. Reply codes are checked at every
//! step: a reply outside the accepted class aborts the session as a
//! rejection rather than being ignored. The socket for each phase is
//! closed exactly once on every exit path.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as B64, Engine};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

use crate::config::DeliveryConfig;
use crate::dispatch::OutboundMail;
use crate::errors::{SmtpStep, TransportError};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const LOCAL_NAME: &str = "localhost";

/// Connection factory seam. Production uses [`TcpDialer`]; tests
/// substitute scripted in-memory streams.
#[async_trait]
pub trait Dialer: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    async fn connect(&self, host: &str, port: u16) -> std::io::Result<Self::Stream>;
    async fn connect_tls(&self, host: &str, port: u16) -> std::io::Result<Self::Stream>;
}

/// Plain TCP or rustls-wrapped TCP, depending on the session phase.
pub enum MaybeTlsStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for MaybeTlsStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match &mut *self {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MaybeTlsStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match &mut *self {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match &mut *self {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_flush(cx),
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match &mut *self {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Dials real sockets, with the webpki root store for the TLS phase.
pub struct TcpDialer {
    tls: TlsConnector,
}

impl TcpDialer {
    pub fn new() -> Self {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        Self {
            tls: TlsConnector::from(Arc::new(config)),
        }
    }
}

impl Default for TcpDialer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    type Stream = MaybeTlsStream;

    async fn connect(&self, host: &str, port: u16) -> std::io::Result<Self::Stream> {
        let stream = TcpStream::connect((host, port)).await?;
        Ok(MaybeTlsStream::Plain(stream))
    }

    async fn connect_tls(&self, host: &str, port: u16) -> std::io::Result<Self::Stream> {
        let stream = TcpStream::connect((host, port)).await?;
        let name = ServerName::try_from(host.to_string())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        let stream = self.tls.connect(name, stream).await?;
        Ok(MaybeTlsStream::Tls(Box::new(stream)))
    }
}

/// The protocol client. Owns no connection between calls; each
/// [`send`](SmtpClient::send) is a self-contained session.
pub struct SmtpClient<D: Dialer> {
    dialer: D,
    host: String,
    port: u16,
    username: String,
    password: String,
    timeout: Duration,
}

impl SmtpClient<TcpDialer> {
    pub fn new(config: &DeliveryConfig) -> Self {
        Self::with_dialer(
            TcpDialer::new(),
            &config.host,
            config.port,
            &config.username,
            &config.password,
        )
    }
}

impl<D: Dialer> SmtpClient<D> {
    pub fn with_dialer(dialer: D, host: &str, port: u16, username: &str, password: &str) -> Self {
        Self {
            dialer,
            host: host.to_string(),
            port,
            username: username.to_string(),
            password: password.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Performs one full delivery attempt.
    pub async fn send(&self, mail: &OutboundMail) -> Result<(), TransportError> {
        // Plaintext phase, up to and including the STARTTLS reply. The
        // connection is then discarded and re-dialed inside TLS; the
        // server forgets its EHLO state across the upgrade.
        let stream = self.dial(SmtpStep::Connect, false).await?;
        let mut session = Session::new(stream, self.timeout);
        let negotiated = self.negotiate_tls(&mut session).await;
        session.close().await;
        negotiated?;

        let stream = self.dial(SmtpStep::TlsHandshake, true).await?;
        let mut session = Session::new(stream, self.timeout);
        let delivered = self.deliver(&mut session, mail).await;
        session.close().await;
        delivered
    }

    async fn dial(&self, step: SmtpStep, tls: bool) -> Result<D::Stream, TransportError> {
        let fut = async {
            if tls {
                self.dialer.connect_tls(&self.host, self.port).await
            } else {
                self.dialer.connect(&self.host, self.port).await
            }
        };
        timeout(self.timeout, fut)
            .await
            .map_err(|_| TransportError::Timeout { step })?
            .map_err(|e| TransportError::io(step, e))
    }

    async fn negotiate_tls<S>(&self, session: &mut Session<S>) -> Result<(), TransportError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        session.expect(SmtpStep::Greeting, '2').await?;
        session
            .command(SmtpStep::Ehlo, &format!("EHLO {LOCAL_NAME}"), '2')
            .await?;
        session.command(SmtpStep::StartTls, "STARTTLS", '2').await?;
        Ok(())
    }

    async fn deliver<S>(
        &self,
        session: &mut Session<S>,
        mail: &OutboundMail,
    ) -> Result<(), TransportError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        session.expect(SmtpStep::SecureGreeting, '2').await?;
        session
            .command(SmtpStep::EhloSecure, &format!("EHLO {LOCAL_NAME}"), '2')
            .await?;

        session.command(SmtpStep::AuthLogin, "AUTH LOGIN", '3').await?;
        session
            .command_redacted(SmtpStep::AuthUsername, &B64.encode(&self.username), '3')
            .await?;
        session
            .command_redacted(SmtpStep::AuthPassword, &B64.encode(&self.password), '2')
            .await?;

        session
            .command(
                SmtpStep::MailFrom,
                &format!("MAIL FROM: <{}>", mail.from_email),
                '2',
            )
            .await?;
        session
            .command(SmtpStep::RcptTo, &format!("RCPT TO: <{}>", mail.to_email), '2')
            .await?;
        session.command(SmtpStep::Data, "DATA", '3').await?;

        session.write_raw(SmtpStep::Body, &format_data(mail)).await?;
        session.expect(SmtpStep::Body, '2').await?;

        // Best effort; the message is already accepted.
        let _ = session.command(SmtpStep::Quit, "QUIT", '2').await;
        Ok(())
    }
}

/// Headers and body as transmitted after `DATA`, terminated by the
/// lone-dot line.
fn format_data(mail: &OutboundMail) -> String {
    let mut data = String::new();
    data.push_str(&format!("From: {} <{}>\r\n", mail.from_name, mail.from_email));
    data.push_str(&format!("To: <{}>\r\n", mail.to_email));
    if let Some(reply_to) = &mail.reply_to {
        data.push_str(&format!("Reply-To: <{reply_to}>\r\n"));
    }
    data.push_str(&format!("Subject: {}\r\n", mail.subject));
    data.push_str("MIME-Version: 1.0\r\n");
    data.push_str("Content-Type: text/html; charset=UTF-8\r\n");
    data.push_str("\r\n");
    data.push_str(&mail.html_body);
    data.push_str("\r\n.\r\n");
    data
}

/// One connection's worth of protocol state. Closing consumes the
/// session, so a socket cannot be closed twice or left open.
struct Session<S> {
    stream: BufReader<S>,
    timeout: Duration,
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> Session<S> {
    fn new(stream: S, timeout: Duration) -> Self {
        Self {
            stream: BufReader::new(stream),
            timeout,
        }
    }

    /// Sends one command line and checks the reply class.
    async fn command(
        &mut self,
        step: SmtpStep,
        line: &str,
        accept: char,
    ) -> Result<String, TransportError> {
        tracing::trace!(%step, command = line, "smtp send");
        self.write_line(step, line).await?;
        self.expect(step, accept).await
    }

    /// Same as [`command`](Self::command) but never traces the payload.
    async fn command_redacted(
        &mut self,
        step: SmtpStep,
        line: &str,
        accept: char,
    ) -> Result<String, TransportError> {
        tracing::trace!(%step, "smtp send (redacted)");
        self.write_line(step, line).await?;
        self.expect(step, accept).await
    }

    async fn write_line(&mut self, step: SmtpStep, line: &str) -> Result<(), TransportError> {
        self.write_raw(step, &format!("{line}\r\n")).await
    }

    async fn write_raw(&mut self, step: SmtpStep, data: &str) -> Result<(), TransportError> {
        let limit = self.timeout;
        let stream = &mut self.stream;
        let fut = async move {
            stream.write_all(data.as_bytes()).await?;
            stream.flush().await
        };
        timeout(limit, fut)
            .await
            .map_err(|_| TransportError::Timeout { step })?
            .map_err(|e| TransportError::io(step, e))
    }

    /// Reads one complete server reply and verifies its code class
    /// (`'2'` or `'3'` depending on the step).
    async fn expect(&mut self, step: SmtpStep, accept: char) -> Result<String, TransportError> {
        let reply = self.read_reply(step).await?;
        if !reply.starts_with(accept) {
            return Err(TransportError::Rejected {
                step,
                reply: reply.trim_end().to_string(),
            });
        }
        Ok(reply)
    }

    /// Accumulates reply lines until one whose fourth character is a
    /// space rather than the `-` continuation marker.
    async fn read_reply(&mut self, step: SmtpStep) -> Result<String, TransportError> {
        let mut reply = String::new();
        loop {
            let mut line = String::new();
            let n = timeout(self.timeout, self.stream.read_line(&mut line))
                .await
                .map_err(|_| TransportError::Timeout { step })?
                .map_err(|e| TransportError::io(step, e))?;
            if n == 0 {
                return Err(TransportError::Closed { step });
            }
            let last = line.as_bytes().get(3) != Some(&b'-');
            reply.push_str(&line);
            if last {
                break;
            }
        }
        tracing::trace!(%step, reply = reply.trim_end(), "smtp recv");
        Ok(reply)
    }

    async fn close(mut self) {
        let _ = self.stream.shutdown().await;
    }
}
