//! REST Request Builders

use chrono::NaiveDateTime;

use crate::error::RequestValidationError;
use crate::types::config::set_header;
use crate::types::RestRequest;

pub const AMI_INTERVAL_READS_PATH: &str =
    "amiadapter-cu-uwp-sys/v1/interval/reads/{premise_number}/{service_point_number}";

/// Format accepted by the interval reads `StartDateTime` parameter.
pub const START_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render a timestamp as a `StartDateTime` value.
pub fn format_start_datetime(value: &NaiveDateTime) -> String {
    value.format(START_DATETIME_FORMAT).to_string()
}

/// Parameters for the AMI interval reads endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IntervalReadsQuery {
    pub premise_number: String,
    pub service_point_number: String,
    pub start_datetime: String,
    /// Extra query parameters; these win over `start_datetime`.
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl IntervalReadsQuery {
    pub fn new(
        premise_number: impl Into<String>,
        service_point_number: impl Into<String>,
        start_datetime: impl Into<String>,
    ) -> Self {
        Self {
            premise_number: premise_number.into(),
            service_point_number: service_point_number.into(),
            start_datetime: start_datetime.into(),
            ..Default::default()
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Validate and build the request; nothing is sent when this fails.
    pub fn to_request(&self) -> Result<RestRequest, RequestValidationError> {
        for (field, value) in [
            ("premise_number", &self.premise_number),
            ("service_point_number", &self.service_point_number),
        ] {
            if value.trim().is_empty() {
                return Err(RequestValidationError::MissingField {
                    field: field.to_string(),
                });
            }
        }
        if self.start_datetime.is_empty() {
            return Err(RequestValidationError::MissingStartDateTime);
        }

        let mut params = vec![("StartDateTime".to_string(), self.start_datetime.clone())];
        for (name, value) in &self.params {
            match params.iter_mut().find(|(existing, _)| existing == name) {
                Some(entry) => entry.1 = value.clone(),
                None => params.push((name.clone(), value.clone())),
            }
        }

        let start = params
            .iter()
            .find(|(name, _)| name == "StartDateTime")
            .map(|(_, value)| value.as_str())
            .unwrap_or_default();
        validate_start_datetime(start)?;

        let path = AMI_INTERVAL_READS_PATH
            .replace("{premise_number}", &self.premise_number)
            .replace("{service_point_number}", &self.service_point_number);

        let mut request = RestRequest::get(path);
        request.params = params;
        for (name, value) in &self.headers {
            set_header(&mut request.headers, name, value);
        }
        Ok(request)
    }
}

/// Build the interval reads request for a meter.
pub fn interval_reads_request(
    premise_number: &str,
    service_point_number: &str,
    start_datetime: &str,
) -> Result<RestRequest, RequestValidationError> {
    IntervalReadsQuery::new(premise_number, service_point_number, start_datetime).to_request()
}

fn validate_start_datetime(value: &str) -> Result<(), RequestValidationError> {
    if value.is_empty() {
        return Err(RequestValidationError::MissingStartDateTime);
    }
    NaiveDateTime::parse_from_str(value, START_DATETIME_FORMAT)
        .map(|_| ())
        .map_err(|_| RequestValidationError::InvalidStartDateTime {
            value: value.to_string(),
        })
}
