#![allow(dead_code)]

pub mod cardiorisk_env;
pub mod data;
