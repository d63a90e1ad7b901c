use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
#[error("{status_code} status code")]
pub struct ServerError {
    pub status_code: u16,
}

pub fn check_status(res: &reqwest::Response) -> Result<(), ServerError> {
    let status = res.status();
    if !status.is_success() {
        return Err(ServerError {
            status_code: status.as_u16(),
        });
    }
    Ok(())
}

/// The `errcode`/`errmsg` pair every endpoint may answer with.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiStatus {
    #[serde(default)]
    pub errcode: Option<i64>,
    #[serde(default)]
    pub errmsg: Option<String>,
}

impl ApiStatus {
    /// The application-level failure, if any. `errcode: 0` means success.
    pub fn failure(&self) -> Option<(i64, String)> {
        match self.errcode {
            Some(errcode) if errcode != 0 => {
                Some((errcode, self.errmsg.clone().unwrap_or_default()))
            }
            _ => None,
        }
    }
}
