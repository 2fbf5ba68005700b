//! Lunch service: menus, plans, subscriptions, monthly fees, served lunches
//! and monthly accounts.

pub mod serializers;
pub mod urls;
pub mod views;
