use std::time::Duration;

use lettre::{
    Message,
    message::{Attachment, Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::{
        authentication::{Credentials, Mechanism},
        client::{SmtpConnection, TlsParameters},
        extension::ClientId,
    },
};
use log::debug;

use crate::transport::{Connection, Connector, InlineImage, Outgoing, SendError};

const MECHANISMS: &[Mechanism] = &[Mechanism::Plain, Mechanism::Login];

/// Opens STARTTLS-secured, authenticated SMTP submission connections.
pub struct SmtpConnector {
    host: String,
    port: u16,
    credentials: Credentials,
    hello: ClientId,
    tls: TlsParameters,
    /// Applied to connect and every command; `None` blocks indefinitely.
    timeout: Option<Duration>,
}

impl SmtpConnector {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        password: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, SendError> {
        let host = host.into();
        let tls = TlsParameters::new(host.clone()).map_err(|e| SendError::Connect(e.to_string()))?;

        Ok(Self {
            host,
            port,
            credentials: Credentials::new(user.into(), password.into()),
            hello: ClientId::default(),
            tls,
            timeout,
        })
    }
}

impl Connector for SmtpConnector {
    type Connection = SmtpLink;

    fn connect(&self) -> Result<SmtpLink, SendError> {
        let mut conn = SmtpConnection::connect(
            (self.host.as_str(), self.port),
            self.timeout,
            &self.hello,
            None,
            None,
        )
        .map_err(|e| SendError::Connect(e.to_string()))?;

        if let Err(e) = conn.starttls(&self.tls, &self.hello) {
            conn.abort();
            return Err(SendError::Connect(format!("STARTTLS: {e}")));
        }

        if let Err(e) = conn.auth(MECHANISMS, &self.credentials) {
            conn.abort();
            return Err(SendError::Auth(e.to_string()));
        }

        debug!("[smtp] connected to {}:{}", self.host, self.port);
        Ok(SmtpLink { conn })
    }
}

pub struct SmtpLink {
    conn: SmtpConnection,
}

impl Connection for SmtpLink {
    fn is_alive(&mut self) -> bool {
        // NOOP round trip
        self.conn.test_connected()
    }

    fn send(&mut self, message: &Outgoing<'_>) -> Result<(), SendError> {
        let message = build_message(message)?;

        self.conn
            .send(message.envelope(), &message.formatted())
            .map(|_| ())
            .map_err(|e| SendError::Transmit(e.to_string()))
    }

    fn close(mut self) -> Result<(), SendError> {
        self.conn
            .quit()
            .map(|_| ())
            .map_err(|e| SendError::Transmit(e.to_string()))
    }
}

fn mailbox(address: &str) -> Result<Mailbox, SendError> {
    address
        .parse()
        .map_err(|e| SendError::Message(format!("bad address '{address}': {e}")))
}

/// HTML body, plus the inline image as a `multipart/related` sibling when
/// there is one.
pub(crate) fn build_message(message: &Outgoing<'_>) -> Result<Message, SendError> {
    let builder = Message::builder()
        .from(mailbox(message.from)?)
        .to(mailbox(message.to)?)
        .subject(message.subject);

    let html = SinglePart::html(message.html.to_owned());

    let built = match message.image {
        Some(image) => builder.multipart(
            MultiPart::related()
                .singlepart(html)
                .singlepart(inline_part(image)?),
        ),
        None => builder.singlepart(html),
    };

    built.map_err(|e| SendError::Message(e.to_string()))
}

fn inline_part(image: &InlineImage) -> Result<SinglePart, SendError> {
    let content_type = ContentType::parse(&image.content_type)
        .map_err(|e| SendError::Message(format!("bad content type: {e}")))?;

    Ok(Attachment::new_inline(InlineImage::CONTENT_ID.to_owned())
        .body(image.bytes.clone(), content_type))
}

#[cfg(test)]
#[path = "smtp_tests.rs"]
mod tests;
