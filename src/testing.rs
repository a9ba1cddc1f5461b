//! In-memory store and adapter fakes for unit tests

use crate::ai_client::{Classification, Classifier, Detection, Detector, WaterFeatures};
use crate::error::{Error, Result};
use crate::observation_store::{Observation, ObservationStore};
use crate::payload::DecodedImage;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct FakeStore {
    latest: Mutex<HashMap<String, Observation>>,
    appended: Mutex<Vec<(String, Value)>>,
    failing_reads: Mutex<HashSet<String>>,
    failing_writes: Mutex<HashSet<String>>,
    reads: AtomicUsize,
}

impl FakeStore {
    pub fn put(&self, path: &str, key: &str, payload: Value) {
        self.latest
            .lock()
            .unwrap()
            .insert(path.to_string(), Observation::new(key, payload));
    }

    pub fn fail_reads(&self, path: &str) {
        self.failing_reads.lock().unwrap().insert(path.to_string());
    }

    pub fn fail_writes(&self, path: &str) {
        self.failing_writes.lock().unwrap().insert(path.to_string());
    }

    pub fn heal_writes(&self) {
        self.failing_writes.lock().unwrap().clear();
    }

    pub fn appended(&self) -> Vec<(String, Value)> {
        self.appended.lock().unwrap().clone()
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObservationStore for FakeStore {
    async fn get_latest(&self, path: &str) -> Result<Option<Observation>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.failing_reads.lock().unwrap().contains(path) {
            return Err(Error::StoreUnavailable(format!("read {}", path)));
        }
        Ok(self.latest.lock().unwrap().get(path).cloned())
    }

    async fn append(&self, path: &str, record: &Value) -> Result<String> {
        if self.failing_writes.lock().unwrap().contains(path) {
            return Err(Error::StoreUnavailable(format!("write {}", path)));
        }
        let mut appended = self.appended.lock().unwrap();
        appended.push((path.to_string(), record.clone()));
        Ok(format!("-N{}", appended.len()))
    }
}

#[derive(Default)]
pub struct FakeClassifier {
    calls: Mutex<Vec<WaterFeatures>>,
}

impl FakeClassifier {
    pub fn calls(&self) -> Vec<WaterFeatures> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Classifier for FakeClassifier {
    async fn classify(&self, features: WaterFeatures) -> Result<Classification> {
        self.calls.lock().unwrap().push(features);
        Ok(Classification {
            label: 1,
            probability: 0.9,
        })
    }
}

#[derive(Default)]
pub struct FakeDetector {
    calls: AtomicUsize,
}

impl FakeDetector {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Detector for FakeDetector {
    async fn detect(&self, _image: &DecodedImage) -> Result<Vec<Detection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![Detection {
            label: 0,
            confidence: 0.75,
            bbox: [1.0, 2.0, 3.0, 4.0],
        }])
    }
}
