pub mod mocks;

mod anchoring;
mod config;
mod integrity;
mod timing;
