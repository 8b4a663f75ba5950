//! RunLog Watch - Change notifier for live log tails

mod notifier;

pub use notifier::{ChangeEvent, ChangeNotifier, Subscription};
