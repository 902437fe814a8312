//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter          | Implements         | Connects to               |
//! |------------------|--------------------|---------------------------|
//! | `adc`            | MeasurementPort    | ESP32 ADC1 oneshot        |
//! | `log_sink`       | EventSink          | Serial / stderr log       |
//! | `telemetry_sink` | EventSink          | Telemetry channel         |
//! | `time`           | DelayNs, uptime    | FreeRTOS / esp_timer      |
//! | `udp_transport`  | Transport          | UDP socket (lwIP / host)  |
//! | `wifi`           | ConnectivityPort   | ESP-IDF WiFi STA          |

pub mod adc;
pub mod log_sink;
pub mod telemetry_sink;
pub mod time;
pub mod udp_transport;
pub mod wifi;
