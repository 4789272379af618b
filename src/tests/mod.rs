
mod test_limit_calls;
