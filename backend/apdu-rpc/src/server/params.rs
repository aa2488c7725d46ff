use crate::error::SmartCardError;

use models::RpcMethod;

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Positional parameter accessors. Every shape mismatch is `INVALID_PARAMS`.
pub(crate) struct Params<'a> {
    method: RpcMethod,
    values: &'a [Value],
}

impl<'a> Params<'a> {
    pub(crate) fn new(method: RpcMethod, values: &'a [Value]) -> Self {
        Self { method, values }
    }

    /// `params[0]` of every `device.*` and `card.*` call. Asking a
    /// `platform.*` call for a handle is a dispatch bug, not a client error.
    #[track_caller]
    pub(crate) fn handle(&self) -> Result<&'a str, SmartCardError> {
        if !self.method.takes_handle() {
            return Err(SmartCardError::internal(format!(
                "{} is not addressed by handle",
                self.method
            )));
        }
        self.string(0)
    }

    #[track_caller]
    pub(crate) fn string(&self, index: usize) -> Result<&'a str, SmartCardError> {
        match self.values.get(index) {
            Some(Value::String(s)) => Ok(s),
            other => Err(self.mismatch(index, "a string", other)),
        }
    }

    /// Absent and `null` both read as `false`.
    #[track_caller]
    pub(crate) fn optional_bool(&self, index: usize) -> Result<bool, SmartCardError> {
        match self.values.get(index) {
            None | Some(Value::Null) => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            other => Err(self.mismatch(index, "a boolean", other)),
        }
    }

    #[track_caller]
    pub(crate) fn millis(&self, index: usize) -> Result<Duration, SmartCardError> {
        match self.values.get(index).and_then(Value::as_u64) {
            Some(ms) => Ok(Duration::from_millis(ms)),
            None => Err(self.mismatch(
                index,
                "a non-negative integer of milliseconds",
                self.values.get(index),
            )),
        }
    }

    #[track_caller]
    pub(crate) fn decode<T: DeserializeOwned>(&self, index: usize) -> Result<T, SmartCardError> {
        let value = self
            .values
            .get(index)
            .ok_or_else(|| self.mismatch(index, "present", None))?;
        T::deserialize(value).map_err(|e| {
            SmartCardError::invalid_params(format!(
                "{}: parameter {index} is malformed: {e}",
                self.method
            ))
        })
    }

    #[track_caller]
    fn mismatch(&self, index: usize, expected: &str, got: Option<&Value>) -> SmartCardError {
        let got = match got {
            None => String::from("nothing"),
            Some(value) => value.to_string(),
        };
        SmartCardError::invalid_params(format!(
            "{}: parameter {index} must be {expected}, got {got}",
            self.method
        ))
    }
}
