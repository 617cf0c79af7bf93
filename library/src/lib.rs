pub mod cache;
pub mod dictionary;
pub mod fragment;
pub mod furigana;
pub mod reading;
pub mod sanitizer;
pub mod serialization;
