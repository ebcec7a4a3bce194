
mod cancel_test;
mod confirm_test;
mod reconcile_test;
