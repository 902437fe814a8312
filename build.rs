fn main() {
    // Only the firmware build needs the ESP-IDF sysenv; host builds skip it.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
