use std::time::Duration;

use log::warn;
use reqwest::{StatusCode, blocking::Client};
use url::Url;

use crate::{error::XMLError, resolver::InputSource};

/// Default timeout applied to HTTP(S) retrievals.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// GET `url` once, without retrying.
///
/// Any status other than `200 OK` is an error.
pub(crate) fn fetch(url: &Url, timeout: Duration) -> Result<InputSource, XMLError> {
    warn!("resource is not in the catalog, retrieving '{url}'");
    let network = |message: String| XMLError::Network {
        url: url.as_str().into(),
        message: message.into(),
    };

    let client = Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| network(err.to_string()))?;
    let response = client
        .get(url.clone())
        .send()
        .map_err(|err| network(err.to_string()))?;
    if response.status() != StatusCode::OK {
        return Err(network(format!("server responded {}", response.status())));
    }
    Ok(InputSource::from_reader(response, Some(url.as_str())))
}
