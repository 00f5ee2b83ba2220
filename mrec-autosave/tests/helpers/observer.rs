//! Observer that records every callback

use mrec_autosave::BindingObserver;
use mrec_common::Error;
use std::sync::Mutex;

#[derive(Default)]
pub struct RecordingObserver {
    pub successes: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<String>>,
    pub created: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn successes(&self) -> Vec<String> {
        self.successes.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn created(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }
}

impl BindingObserver<String> for RecordingObserver {
    fn on_success(&self, value: &String) {
        self.successes.lock().unwrap().push(value.clone());
    }

    fn on_error(&self, error: &Error) {
        self.errors.lock().unwrap().push(error.to_string());
    }

    fn on_create_success(&self, record_id: &str) {
        self.created.lock().unwrap().push(record_id.to_string());
    }
}
