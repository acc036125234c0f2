pub mod classifier;
pub mod config;
pub mod error;
pub mod fanout;
pub mod lifecycle;
pub mod lists;
pub mod models;
pub mod phone;
pub mod rules;
pub mod simulator;
pub mod statistics;
pub mod store;
pub mod webhook;

pub use classifier::{CallClassifier, Decision};
pub use config::Config;
pub use error::{Result, ScreenError};
pub use fanout::{CallEvent, Fanout};
pub use lifecycle::{CallCoordinator, CallEndOutcome, DisconnectReason};
pub use lists::{ListVerdict, PhoneLists};
pub use models::{CallRecord, Classification};
pub use phone::PhoneNumber;
pub use simulator::TrafficGenerator;
pub use statistics::CallStatistics;
pub use store::{CallStore, SqliteStore};
pub use webhook::WebhookAdapter;
