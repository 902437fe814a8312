//! ADC measurement adapter.
//!
//! Implements [`MeasurementPort`] on top of a single ADC1 channel:
//! `measurement = raw * scale + offset`.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: ESP-IDF oneshot driver, 12-bit, 0 dB
//!   attenuation (0–~950 mV full scale).
//! - **all other targets**: the raw value comes from an [`AdcProbe`] that
//!   tests and the host simulation write to.
//!
//! A failed conversion yields `NaN`; the PID engine ignores non-finite
//! samples, so a glitch holds the previous output instead of kicking it.

#[cfg(not(target_os = "espidf"))]
use std::sync::Arc;
#[cfg(not(target_os = "espidf"))]
use std::sync::atomic::{AtomicU16, Ordering};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::MeasurementPort;
use crate::config::SystemConfig;
use crate::error::{Error, Result};

/// Full-scale raw value of a 12-bit conversion.
pub const ADC_MAX_RAW: u16 = 4095;

// ───────────────────────────────────────────────────────────────
// Raw reader (platform)
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
struct RawAdc {
    handle: adc_oneshot_unit_handle_t,
    channel: adc_channel_t,
}

// SAFETY: the oneshot handle is owned by exactly one `RawAdc` and only
// used through `&mut self`.
#[cfg(target_os = "espidf")]
unsafe impl Send for RawAdc {}

#[cfg(target_os = "espidf")]
impl RawAdc {
    fn open(channel: u32) -> Result<Self> {
        let init_cfg = adc_oneshot_unit_init_cfg_t {
            unit_id: adc_unit_t_ADC_UNIT_1,
            ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
            ..Default::default()
        };
        let mut handle: adc_oneshot_unit_handle_t = core::ptr::null_mut();
        // SAFETY: init_cfg and handle outlive the call.
        let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &mut handle) };
        if ret != ESP_OK as i32 {
            warn!("ADC1 unit init failed (rc={})", ret);
            return Err(Error::Config("ADC1 unit init failed"));
        }

        let chan_cfg = adc_oneshot_chan_cfg_t {
            atten: adc_atten_t_ADC_ATTEN_DB_0,
            bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
        };
        // SAFETY: handle was just created by adc_oneshot_new_unit.
        let ret = unsafe { adc_oneshot_config_channel(handle, channel, &chan_cfg) };
        if ret != ESP_OK as i32 {
            warn!("ADC1 channel {} config failed (rc={})", channel, ret);
            unsafe { adc_oneshot_del_unit(handle) };
            return Err(Error::Config("ADC1 channel config failed"));
        }

        Ok(Self { handle, channel })
    }

    fn read(&mut self) -> Option<u16> {
        let mut raw: i32 = 0;
        // SAFETY: handle is valid for the lifetime of self.
        let ret = unsafe { adc_oneshot_read(self.handle, self.channel, &mut raw) };
        (ret == ESP_OK as i32).then(|| raw.clamp(0, i32::from(ADC_MAX_RAW)) as u16)
    }
}

#[cfg(target_os = "espidf")]
impl Drop for RawAdc {
    fn drop(&mut self) {
        unsafe { adc_oneshot_del_unit(self.handle) };
    }
}

/// Host-side stand-in for the ADC pin.  Cloneable; all clones share one
/// raw value.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, Default)]
pub struct AdcProbe(Arc<AtomicU16>);

#[cfg(not(target_os = "espidf"))]
impl AdcProbe {
    pub fn set_raw(&self, raw: u16) {
        self.0.store(raw.min(ADC_MAX_RAW), Ordering::Relaxed);
    }

    pub fn raw(&self) -> u16 {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(not(target_os = "espidf"))]
struct RawAdc {
    probe: AdcProbe,
}

#[cfg(not(target_os = "espidf"))]
impl RawAdc {
    fn read(&mut self) -> Option<u16> {
        Some(self.probe.raw())
    }
}

// ───────────────────────────────────────────────────────────────
// AdcSource
// ───────────────────────────────────────────────────────────────

pub struct AdcSource {
    raw: RawAdc,
    scale: f32,
    offset: f32,
    read_failures: u32,
}

impl AdcSource {
    /// Open the configured ADC1 channel.
    #[cfg(target_os = "espidf")]
    pub fn open(config: &SystemConfig) -> Result<Self> {
        let raw = RawAdc::open(config.adc_channel)?;
        info!(
            "ADC1: channel {} ready (12-bit, 0 dB, scale={}, offset={})",
            config.adc_channel, config.measurement_scale, config.measurement_offset
        );
        Ok(Self::with_raw(raw, config))
    }

    /// Simulated channel; returns the source and the probe that drives it.
    #[cfg(not(target_os = "espidf"))]
    pub fn open(config: &SystemConfig) -> Result<(Self, AdcProbe)> {
        if !config.measurement_scale.is_finite() {
            return Err(Error::Config("measurement scale/offset must be finite"));
        }
        let probe = AdcProbe::default();
        info!("ADC(sim): channel {} backed by probe", config.adc_channel);
        let raw = RawAdc {
            probe: probe.clone(),
        };
        Ok((Self::with_raw(raw, config), probe))
    }

    fn with_raw(raw: RawAdc, config: &SystemConfig) -> Self {
        Self {
            raw,
            scale: config.measurement_scale,
            offset: config.measurement_offset,
            read_failures: 0,
        }
    }

    pub fn read_failures(&self) -> u32 {
        self.read_failures
    }
}

impl MeasurementPort for AdcSource {
    fn sample(&mut self) -> f32 {
        match self.raw.read() {
            Some(raw) => f32::from(raw) * self.scale + self.offset,
            None => {
                self.read_failures = self.read_failures.wrapping_add(1);
                log::debug!("ADC read failed ({} total)", self.read_failures);
                f32::NAN
            }
        }
    }
}
