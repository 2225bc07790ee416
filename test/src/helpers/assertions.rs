/// Assert that a condition becomes true within the default wait
#[macro_export]
macro_rules! assert_eventually {
    ($condition:expr, $($message:tt)+) => {
        assert!(
            $crate::wait_until($crate::DEFAULT_WAIT, || $condition),
            $($message)+
        );
    };
}
