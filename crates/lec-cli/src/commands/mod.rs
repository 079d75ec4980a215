pub mod dispatch;
pub mod instances;
pub mod journal;
pub mod reconcile;
pub mod seed;
pub mod submit;
pub mod view;
pub mod watch;
