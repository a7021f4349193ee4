// SPDX-License-Identifier: GPL-3.0-only
//! Billboard device session over rusb

use std::time::Duration;

use rusb::{Context, DeviceHandle, UsbContext};

use crate::devices::DeviceSpec;
use crate::error::{OsdError, Result};
use crate::protocols::ControlTransport;

/// Kernel driver and configuration control of an open USB device
pub trait KernelDriverControl {
    fn kernel_driver_active(&mut self, interface: u8) -> rusb::Result<bool>;
    fn detach_kernel_driver(&mut self, interface: u8) -> rusb::Result<()>;
    fn attach_kernel_driver(&mut self, interface: u8) -> rusb::Result<()>;
    fn set_active_configuration(&mut self, configuration: u8) -> rusb::Result<()>;
}

impl<T: UsbContext> KernelDriverControl for DeviceHandle<T> {
    fn kernel_driver_active(&mut self, interface: u8) -> rusb::Result<bool> {
        DeviceHandle::kernel_driver_active(self, interface)
    }

    fn detach_kernel_driver(&mut self, interface: u8) -> rusb::Result<()> {
        DeviceHandle::detach_kernel_driver(self, interface)
    }

    fn attach_kernel_driver(&mut self, interface: u8) -> rusb::Result<()> {
        DeviceHandle::attach_kernel_driver(self, interface)
    }

    fn set_active_configuration(&mut self, configuration: u8) -> rusb::Result<()> {
        DeviceHandle::set_active_configuration(self, configuration)
    }
}

/// Holds a device handle with the kernel driver detached from one interface
///
/// The driver is reattached when the guard is dropped, only if the guard
/// detached it.
pub struct DriverGuard<H: KernelDriverControl> {
    handle: H,
    interface: u8,
    detached: bool,
}

impl<H: KernelDriverControl> DriverGuard<H> {
    /// Take over a located device: detach the kernel driver, then select the
    /// configuration of `spec`
    ///
    /// `None` means the device was not found.
    pub fn acquire(handle: Option<H>, spec: &DeviceSpec) -> Result<Self> {
        let handle = handle.ok_or(OsdError::DeviceNotFound {
            vendor_id: spec.vendor_id,
            product_id: spec.product_id,
        })?;

        let mut guard = Self {
            handle,
            interface: spec.interface,
            detached: false,
        };

        // From here on an early return drops `guard`, which reattaches the
        // kernel driver if it was detached.
        guard.detach()?;
        guard.handle.set_active_configuration(spec.configuration)?;
        Ok(guard)
    }

    fn detach(&mut self) -> Result<()> {
        match self.handle.kernel_driver_active(self.interface) {
            Ok(true) => {
                self.handle.detach_kernel_driver(self.interface)?;
                self.detached = true;
                tracing::debug!("Detached kernel driver from interface {}", self.interface);
            }
            Ok(false) => {}
            // Platforms without kernel driver ownership (Windows, macOS)
            Err(rusb::Error::NotSupported) => {
                tracing::debug!("Kernel driver detach not supported on this platform");
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    pub fn handle(&self) -> &H {
        &self.handle
    }
}

impl<H: KernelDriverControl> Drop for DriverGuard<H> {
    fn drop(&mut self) {
        if !self.detached {
            return;
        }
        match self.handle.attach_kernel_driver(self.interface) {
            Ok(()) => tracing::debug!("Reattached kernel driver to interface {}", self.interface),
            Err(e) => tracing::warn!(
                "Failed to reattach kernel driver to interface {}: {}",
                self.interface,
                e
            ),
        }
    }
}

/// An open USB session with a monitor's Billboard Device
///
/// If a kernel driver was bound to the control interface it is detached
/// while the session is open and reattached when the value is dropped.
pub struct BillboardDevice {
    guard: DriverGuard<DeviceHandle<Context>>,
    spec: DeviceSpec,
    timeout: Duration,
}

impl BillboardDevice {
    /// Find the device described by `spec` and open a session
    ///
    /// # Arguments
    /// * `spec` - Identifiers and interface layout of the device
    /// * `timeout` - Timeout applied to every control transfer
    pub fn open(spec: &DeviceSpec, timeout: Duration) -> Result<Self> {
        let context = Context::new()?;
        let handle = context.open_device_with_vid_pid(spec.vendor_id, spec.product_id);

        if let Some(ref handle) = handle {
            tracing::debug!(
                "Opened {} ({:04x}:{:04x}) on bus {} address {}",
                spec.name,
                spec.vendor_id,
                spec.product_id,
                handle.device().bus_number(),
                handle.device().address()
            );
        }

        let guard = DriverGuard::acquire(handle, spec)?;
        tracing::info!("Session opened with {}", spec.name);
        Ok(Self {
            guard,
            spec: spec.clone(),
            timeout,
        })
    }

    /// Specification of the opened device
    pub fn spec(&self) -> &DeviceSpec {
        &self.spec
    }
}

impl ControlTransport for BillboardDevice {
    fn write_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<usize> {
        Ok(self.guard.handle().write_control(
            request_type,
            request,
            value,
            index,
            data,
            self.timeout,
        )?)
    }

    fn read_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
    ) -> Result<usize> {
        Ok(self.guard.handle().read_control(
            request_type,
            request,
            value,
            index,
            buf,
            self.timeout,
        )?)
    }
}

impl std::fmt::Debug for BillboardDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BillboardDevice({} {:04x}:{:04x}, driver_detached: {})",
            self.spec.name, self.spec.vendor_id, self.spec.product_id, self.guard.detached
        )
    }
}
