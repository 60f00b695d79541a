mod clerk;
pub use clerk::*;

#[cfg(test)]
mod test_clerk;
