use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use strum_macros::AsRefStr;

use super::routes::SubscribeError;

pub type WebResult<T> = core::result::Result<T, Error>;

#[derive(Debug, AsRefStr, thiserror::Error)]
pub enum Error {
    #[error("subscribe error: {0}")]
    Subscribe(#[from] SubscribeError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn status_code_and_client_error(&self) -> (StatusCode, ClientError) {
        use ClientError::*;

        match self {
            Error::Subscribe(sub_er) => match sub_er {
                SubscribeError::DataParsing(data_er) => {
                    let message = match data_er {
                        super::types::DataParsingError::EmailMissing => "Email is required",
                        super::types::DataParsingError::EmailInvalid => "Invalid email format",
                    };
                    (StatusCode::BAD_REQUEST, InvalidInput(message))
                }
                SubscribeError::Persistence(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, PersistenceFailure)
                }
                SubscribeError::Delivery(_) => (StatusCode::INTERNAL_SERVER_ERROR, DeliveryFailure),
                SubscribeError::UnreadableBody(_)
                | SubscribeError::MalformedBody(_)
                | SubscribeError::NullBody
                | SubscribeError::Render(_) => (StatusCode::INTERNAL_SERVER_ERROR, Unhandled),
            },
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, Unhandled),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        tracing::debug!("{:<12} - into_response(Error: {self:?})", "INTO_RESP");

        // Construct a response
        let mut res = StatusCode::INTERNAL_SERVER_ERROR.into_response();

        // Insert the Error into response so that it can be retrieved later.
        res.extensions_mut().insert(Arc::new(self));

        res
    }
}

/// The errors a client gets to see, their `Display` is the message in the response body.
#[derive(Debug, AsRefStr, derive_more::Display)]
pub enum ClientError {
    #[display("{_0}")]
    InvalidInput(&'static str),
    #[display("Failed to save subscription")]
    PersistenceFailure,
    #[display("Failed to send confirmation email")]
    DeliveryFailure,
    #[display("Internal server error")]
    Unhandled,
}
