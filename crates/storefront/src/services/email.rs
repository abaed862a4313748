//! Transactional email.
//!
//! Uses SMTP via lettre for delivery with Askama templates, each message
//! sent as a text/HTML multipart. Callers spawn these sends; a failed email
//! is logged and never fails the request that triggered it.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use thiserror::Error;

use kirana_core::PaymentMethodKind;

use crate::config::EmailConfig;
use crate::models::{Order, OrderWithItems};

/// Store name used in subjects and greetings.
const STORE_NAME: &str = "Kirana";

/// One line in an order email, pre-formatted.
struct EmailLine {
    name: String,
    quantity: i32,
    line_total: String,
}

#[derive(Template)]
#[template(path = "email/welcome.html")]
struct WelcomeHtml<'a> {
    name: &'a str,
    shop_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/welcome.txt")]
struct WelcomeText<'a> {
    name: &'a str,
    shop_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_reset.html")]
struct PasswordResetHtml<'a> {
    name: &'a str,
    reset_url: &'a str,
    valid_minutes: i64,
}

#[derive(Template)]
#[template(path = "email/password_reset.txt")]
struct PasswordResetText<'a> {
    name: &'a str,
    reset_url: &'a str,
    valid_minutes: i64,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    name: &'a str,
    order_number: &'a str,
    lines: &'a [EmailLine],
    subtotal: String,
    discount: Option<String>,
    shipping_fee: String,
    tax: Option<String>,
    total: String,
    cash_on_delivery: bool,
    order_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    name: &'a str,
    order_number: &'a str,
    lines: &'a [EmailLine],
    subtotal: String,
    discount: Option<String>,
    shipping_fee: String,
    tax: Option<String>,
    total: String,
    cash_on_delivery: bool,
    order_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_status.html")]
struct OrderStatusHtml<'a> {
    name: &'a str,
    order_number: &'a str,
    status: &'a str,
    carrier: Option<&'a str>,
    tracking_number: Option<&'a str>,
    order_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_status.txt")]
struct OrderStatusText<'a> {
    name: &'a str,
    order_number: &'a str,
    status: &'a str,
    carrier: Option<&'a str>,
    tracking_number: Option<&'a str>,
    order_url: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    base_url: String,
}

impl std::fmt::Debug for EmailService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailService")
            .field("from_address", &self.from_address)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// `base_url` is the client origin used to build links.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig, base_url: &str) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Send a welcome email after registration.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_welcome(&self, to: &str, name: &str) -> Result<(), EmailError> {
        let shop_url = self.base_url.as_str();
        let html = WelcomeHtml { name, shop_url }.render()?;
        let text = WelcomeText { name, shop_url }.render()?;

        self.send_multipart_email(to, &format!("Welcome to {STORE_NAME}"), &text, &html)
            .await
    }

    /// Send a password reset link.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_password_reset(
        &self,
        to: &str,
        name: &str,
        token: &str,
        valid_minutes: i64,
    ) -> Result<(), EmailError> {
        let reset_url = reset_link(&self.base_url, token);
        let html = PasswordResetHtml {
            name,
            reset_url: &reset_url,
            valid_minutes,
        }
        .render()?;
        let text = PasswordResetText {
            name,
            reset_url: &reset_url,
            valid_minutes,
        }
        .render()?;

        self.send_multipart_email(to, &format!("Reset your {STORE_NAME} password"), &text, &html)
            .await
    }

    /// Send the order confirmation with its line items and totals.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_order_confirmation(
        &self,
        to: &str,
        name: &str,
        order: &OrderWithItems,
    ) -> Result<(), EmailError> {
        let o = &order.order;
        let lines: Vec<EmailLine> = order
            .items
            .iter()
            .map(|item| EmailLine {
                name: item.name.clone(),
                quantity: item.quantity,
                line_total: rupees(item.line_total),
            })
            .collect();
        let order_url = order_link(&self.base_url, o);
        let discount = (!o.discount.is_zero()).then(|| rupees(o.discount));
        let tax = (!o.tax.is_zero()).then(|| rupees(o.tax));
        let cash_on_delivery = o.payment.method == PaymentMethodKind::Cod;

        let html = OrderConfirmationHtml {
            name,
            order_number: &o.order_number,
            lines: &lines,
            subtotal: rupees(o.subtotal),
            discount: discount.clone(),
            shipping_fee: rupees(o.shipping_fee),
            tax: tax.clone(),
            total: rupees(o.total),
            cash_on_delivery,
            order_url: &order_url,
        }
        .render()?;
        let text = OrderConfirmationText {
            name,
            order_number: &o.order_number,
            lines: &lines,
            subtotal: rupees(o.subtotal),
            discount,
            shipping_fee: rupees(o.shipping_fee),
            tax,
            total: rupees(o.total),
            cash_on_delivery,
            order_url: &order_url,
        }
        .render()?;

        self.send_multipart_email(
            to,
            &format!("Order {} confirmed", o.order_number),
            &text,
            &html,
        )
        .await
    }

    /// Tell the shopper their order moved to a new status.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_order_status(
        &self,
        to: &str,
        name: &str,
        order: &Order,
    ) -> Result<(), EmailError> {
        let order_url = order_link(&self.base_url, order);
        let status = order.status.as_str();
        let carrier = order.delivery.carrier.as_deref();
        let tracking_number = order.delivery.tracking_number.as_deref();

        let html = OrderStatusHtml {
            name,
            order_number: &order.order_number,
            status,
            carrier,
            tracking_number,
            order_url: &order_url,
        }
        .render()?;
        let text = OrderStatusText {
            name,
            order_number: &order.order_number,
            status,
            carrier,
            tracking_number,
            order_url: &order_url,
        }
        .render()?;

        self.send_multipart_email(
            to,
            &format!("Order {} is {status}", order.order_number),
            &text,
            &html,
        )
        .await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

/// Format an amount as `₹1,234.50`.
fn rupees(amount: Decimal) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((&fixed, "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if amount.is_sign_negative() && !amount.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}₹{grouped}.{fraction}")
}

fn order_link(base_url: &str, order: &Order) -> String {
    format!("{base_url}/orders/{}", order.id)
}

fn reset_link(base_url: &str, token: &str) -> String {
    format!("{base_url}/reset-password?token={token}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rupees_formatting() {
        assert_eq!(rupees(Decimal::new(4900, 2)), "₹49.00");
        assert_eq!(rupees(Decimal::new(12_345_675, 2)), "₹123,456.75");
        assert_eq!(rupees(Decimal::from(1000)), "₹1,000.00");
        assert_eq!(rupees(Decimal::ZERO), "₹0.00");
    }

    #[test]
    fn test_reset_link() {
        assert_eq!(
            reset_link("https://shop.example", "abc_-1"),
            "https://shop.example/reset-password?token=abc_-1"
        );
    }

    #[test]
    fn test_welcome_template_escapes_name() {
        let html = WelcomeHtml {
            name: "<b>Asha</b>",
            shop_url: "https://shop.example",
        }
        .render()
        .unwrap_or_default();
        assert!(html.contains("&lt;b&gt;Asha&lt;/b&gt;"));
    }

    #[test]
    fn test_order_status_text_mentions_tracking() {
        let text = OrderStatusText {
            name: "Asha",
            order_number: "ORD-20260101-ABC123",
            status: "shipped",
            carrier: Some("Delhivery"),
            tracking_number: Some("DL123"),
            order_url: "https://shop.example/orders/1",
        }
        .render()
        .unwrap_or_default();
        assert!(text.contains("ORD-20260101-ABC123"));
        assert!(text.contains("DL123"));
    }
}
