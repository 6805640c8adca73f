//! Physical device selection and surface capability probing.

use std::ffi::CStr;

use ash::vk;

use crate::error::{GpuError, Result};

/// Queue families the renderer needs, resolved per role.
///
/// The graphics and present roles may land on the same family or on
/// different ones; both must resolve before a candidate is accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyAssignment {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyAssignment {
    /// Both roles resolved to some family index.
    pub const fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }
}

/// Snapshot of what a (device, surface) pair can do.
///
/// Queried on demand and never cached across device changes.
pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    /// Query support for a candidate against the target surface.
    ///
    /// # Safety
    /// The surface loader, device, and surface must be valid.
    pub unsafe fn query(
        surface_loader: &ash::khr::surface::Instance,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Self> {
        let capabilities =
            surface_loader.get_physical_device_surface_capabilities(device, surface)?;
        let formats = surface_loader.get_physical_device_surface_formats(device, surface)?;
        let present_modes =
            surface_loader.get_physical_device_surface_present_modes(device, surface)?;

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// A candidate needs at least one format and one present mode. Empty
    /// sets are a valid "unsupported" outcome, not an error.
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Required device extensions for presentation.
pub fn required_device_extensions() -> Vec<&'static CStr> {
    vec![ash::khr::swapchain::NAME]
}

/// Resolve the graphics and present roles from the queried family tables.
///
/// `present_support[i]` reports whether family `i` can present to the
/// target surface. Each role takes the first family that supports it and
/// the scan stops as soon as both are resolved.
pub fn resolve_queue_families(
    families: &[vk::QueueFamilyProperties],
    present_support: &[bool],
) -> QueueFamilyAssignment {
    let mut assignment = QueueFamilyAssignment::default();

    for (index, family) in families.iter().enumerate() {
        if assignment.graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            assignment.graphics = Some(index as u32);
        }
        if assignment.present.is_none() && present_support.get(index).copied().unwrap_or(false) {
            assignment.present = Some(index as u32);
        }
        if assignment.is_complete() {
            break;
        }
    }

    assignment
}

/// Pre-queried capability tables for one candidate device.
///
/// Everything the suitability decision needs, captured up front so the
/// decision itself stays free of driver calls.
pub struct CandidateProfile {
    pub families: Vec<vk::QueueFamilyProperties>,
    pub present_support: Vec<bool>,
    pub extensions: Vec<vk::ExtensionProperties>,
    pub surface: SurfaceSupport,
}

/// Run the three suitability checks, in order, over pre-queried tables.
///
/// Queue family coverage, then required extensions, then adequate surface
/// support. `None` means "reject this candidate".
pub fn evaluate_candidate(profile: &CandidateProfile) -> Option<QueueFamilyAssignment> {
    let assignment = resolve_queue_families(&profile.families, &profile.present_support);
    if !assignment.is_complete() {
        return None;
    }

    if !missing_device_extensions(&required_device_extensions(), &profile.extensions).is_empty() {
        return None;
    }

    if !profile.surface.is_adequate() {
        return None;
    }

    Some(assignment)
}

/// First-match scan over fixed candidate tables.
///
/// Returns the index of the first suitable profile and its assignment; the
/// scan stops there, so candidates after the winner are never evaluated.
pub fn select_from_profiles(
    profiles: &[CandidateProfile],
) -> Option<(usize, QueueFamilyAssignment)> {
    profiles
        .iter()
        .enumerate()
        .find_map(|(index, profile)| evaluate_candidate(profile).map(|a| (index, a)))
}

/// Required extensions that a candidate's extension table does not cover.
pub fn missing_device_extensions<'a>(
    required: &[&'a CStr],
    available: &[vk::ExtensionProperties],
) -> Vec<&'a CStr> {
    required
        .iter()
        .copied()
        .filter(|&req| {
            !available
                .iter()
                .any(|props| props.extension_name_as_c_str().is_ok_and(|name| name == req))
        })
        .collect()
}

/// Pick the first enumerated device that can drive the surface.
///
/// Candidates are checked in enumeration order for queue family coverage,
/// required extensions, and adequate surface support; the first one passing
/// all three wins and the scan stops. Unsuitable candidates are skipped,
/// which is the only locally recovered failure in this crate.
///
/// # Safety
/// The instance, surface loader, and surface must be valid.
pub unsafe fn select_physical_device(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<(vk::PhysicalDevice, QueueFamilyAssignment)> {
    let devices = instance.enumerate_physical_devices()?;
    if devices.is_empty() {
        return Err(GpuError::NoDeviceFound);
    }

    for device in devices {
        let name = device_name(instance, device);
        match check_suitability(instance, surface_loader, device, surface)? {
            Some(assignment) => {
                tracing::info!(
                    "Selected GPU: {name} (graphics family {}, present family {})",
                    assignment.graphics.unwrap_or(u32::MAX),
                    assignment.present.unwrap_or(u32::MAX),
                );
                return Ok((device, assignment));
            }
            None => {
                tracing::debug!("Skipping unsuitable GPU: {name}");
            }
        }
    }

    Err(GpuError::NoSuitableDevice)
}

/// Query one candidate's tables and evaluate them.
///
/// `Ok(None)` means "reject and move on"; query errors propagate. The
/// earlier checks short-circuit the later queries, so a candidate with no
/// usable queue families never has its surface queried.
unsafe fn check_suitability(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> Result<Option<QueueFamilyAssignment>> {
    let families = instance.get_physical_device_queue_family_properties(device);
    let mut present_support = Vec::with_capacity(families.len());
    for index in 0..families.len() as u32 {
        present_support
            .push(surface_loader.get_physical_device_surface_support(device, index, surface)?);
    }

    if !resolve_queue_families(&families, &present_support).is_complete() {
        return Ok(None);
    }

    let extensions = instance.enumerate_device_extension_properties(device)?;
    let missing = missing_device_extensions(&required_device_extensions(), &extensions);
    if !missing.is_empty() {
        tracing::debug!("Missing device extensions: {missing:?}");
        return Ok(None);
    }

    let support = SurfaceSupport::query(surface_loader, device, surface)?;
    Ok(evaluate_candidate(&CandidateProfile {
        families,
        present_support,
        extensions,
        surface: support,
    }))
}

unsafe fn device_name(instance: &ash::Instance, device: vk::PhysicalDevice) -> String {
    let properties = instance.get_physical_device_properties(device);
    properties
        .device_name_as_c_str()
        .unwrap_or(c"unknown")
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    fn extension(name: &std::ffi::CStr) -> vk::ExtensionProperties {
        let mut props = vk::ExtensionProperties::default();
        for (dst, src) in props
            .extension_name
            .iter_mut()
            .zip(name.to_bytes_with_nul())
        {
            *dst = *src as std::ffi::c_char;
        }
        props
    }

    #[test]
    fn single_family_covers_both_roles() {
        let families = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER)];
        let assignment = resolve_queue_families(&families, &[true]);

        assert_eq!(assignment.graphics, Some(0));
        assert_eq!(assignment.present, Some(0));
        assert!(assignment.is_complete());
    }

    #[test]
    fn roles_may_split_across_families() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::COMPUTE),
        ];
        // Only the compute family can present.
        let assignment = resolve_queue_families(&families, &[false, true]);

        assert_eq!(assignment.graphics, Some(0));
        assert_eq!(assignment.present, Some(1));
        assert!(assignment.is_complete());
    }

    #[test]
    fn missing_role_leaves_assignment_incomplete() {
        let families = [family(vk::QueueFlags::COMPUTE)];
        let assignment = resolve_queue_families(&families, &[true]);
        assert_eq!(assignment.graphics, None);
        assert!(!assignment.is_complete());

        let families = [family(vk::QueueFlags::GRAPHICS)];
        let assignment = resolve_queue_families(&families, &[false]);
        assert_eq!(assignment.present, None);
        assert!(!assignment.is_complete());
    }

    #[test]
    fn resolution_is_deterministic_over_a_fixed_table() {
        let families = [
            family(vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
        ];
        let present = [true, false, true];

        let first = resolve_queue_families(&families, &present);
        let second = resolve_queue_families(&families, &present);

        assert_eq!(first, second);
        // First family that supports each role wins.
        assert_eq!(first.graphics, Some(1));
        assert_eq!(first.present, Some(0));
    }

    fn adequate_surface() -> SurfaceSupport {
        SurfaceSupport {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![vk::SurfaceFormatKHR::default()],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        }
    }

    fn profile(
        families: Vec<vk::QueueFamilyProperties>,
        present_support: Vec<bool>,
        extensions: Vec<vk::ExtensionProperties>,
        surface: SurfaceSupport,
    ) -> CandidateProfile {
        CandidateProfile {
            families,
            present_support,
            extensions,
            surface,
        }
    }

    #[test]
    fn candidate_fails_each_check_independently() {
        let swapchain = || vec![extension(c"VK_KHR_swapchain")];

        // No graphics family.
        let rejected = profile(
            vec![family(vk::QueueFlags::COMPUTE)],
            vec![true],
            swapchain(),
            adequate_surface(),
        );
        assert_eq!(evaluate_candidate(&rejected), None);

        // Missing the swapchain extension.
        let rejected = profile(
            vec![family(vk::QueueFlags::GRAPHICS)],
            vec![true],
            vec![],
            adequate_surface(),
        );
        assert_eq!(evaluate_candidate(&rejected), None);

        // No surface formats.
        let rejected = profile(
            vec![family(vk::QueueFlags::GRAPHICS)],
            vec![true],
            swapchain(),
            SurfaceSupport {
                capabilities: vk::SurfaceCapabilitiesKHR::default(),
                formats: vec![],
                present_modes: vec![vk::PresentModeKHR::FIFO],
            },
        );
        assert_eq!(evaluate_candidate(&rejected), None);

        let accepted = profile(
            vec![family(vk::QueueFlags::GRAPHICS)],
            vec![true],
            swapchain(),
            adequate_surface(),
        );
        assert_eq!(
            evaluate_candidate(&accepted),
            Some(QueueFamilyAssignment {
                graphics: Some(0),
                present: Some(0),
            })
        );
    }

    #[test]
    fn selection_is_idempotent_over_a_fixed_candidate_table() {
        // Candidate 0 cannot present, candidate 1 splits the roles across
        // two families, candidate 2 would also pass but comes later.
        let profiles = [
            profile(
                vec![family(vk::QueueFlags::GRAPHICS)],
                vec![false],
                vec![extension(c"VK_KHR_swapchain")],
                adequate_surface(),
            ),
            profile(
                vec![
                    family(vk::QueueFlags::COMPUTE),
                    family(vk::QueueFlags::GRAPHICS),
                ],
                vec![true, false],
                vec![extension(c"VK_KHR_swapchain")],
                adequate_surface(),
            ),
            profile(
                vec![family(vk::QueueFlags::GRAPHICS)],
                vec![true],
                vec![extension(c"VK_KHR_swapchain")],
                adequate_surface(),
            ),
        ];

        let first = select_from_profiles(&profiles);
        let second = select_from_profiles(&profiles);

        assert_eq!(first, second);
        let (index, assignment) = first.unwrap();
        // First suitable candidate wins even when a later one would too.
        assert_eq!(index, 1);
        assert_eq!(assignment.graphics, Some(1));
        assert_eq!(assignment.present, Some(0));
    }

    #[test]
    fn no_suitable_candidate_selects_nothing() {
        let profiles = [profile(
            vec![family(vk::QueueFlags::GRAPHICS)],
            vec![true],
            vec![],
            adequate_surface(),
        )];
        assert_eq!(select_from_profiles(&profiles), None);
        assert_eq!(select_from_profiles(&[]), None);
    }

    #[test]
    fn extension_check_reports_missing_names() {
        let available = [extension(c"VK_KHR_swapchain"), extension(c"VK_KHR_maintenance1")];

        assert!(missing_device_extensions(&[c"VK_KHR_swapchain"], &available).is_empty());
        assert_eq!(
            missing_device_extensions(&[c"VK_KHR_swapchain", c"VK_EXT_mesh_shader"], &available),
            vec![c"VK_EXT_mesh_shader"]
        );
        assert_eq!(
            missing_device_extensions(&[c"VK_KHR_swapchain"], &[]),
            vec![c"VK_KHR_swapchain"]
        );
    }

    #[test]
    fn empty_support_sets_are_inadequate_not_errors() {
        let support = SurfaceSupport {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(!support.is_adequate());

        let support = SurfaceSupport {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![vk::SurfaceFormatKHR::default()],
            present_modes: vec![],
        };
        assert!(!support.is_adequate());

        let support = SurfaceSupport {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![vk::SurfaceFormatKHR::default()],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(support.is_adequate());
    }
}
