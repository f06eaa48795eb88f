pub mod alerts;
pub mod forecast;
pub mod window;
