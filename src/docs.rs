use crate::allocation::scoring::ScoreBreakdown;
use crate::api::allocate::{
    AllocateDayRequest, AllocateRequest, AllocateResponse, Assignment, RecentAssignment,
    ScanGuardRequest,
};
use crate::api::attendance::{CheckInRequest, CheckInResponse};
use crate::api::dashboard::{DashboardAnalytics, DashboardSummary, DayAttendance, GuardWorkload};
use crate::api::guard::{CreateGuard, GuardListResponse, UpdateGuard};
use crate::api::patrol::{ActiveGuard, CreatePatrol, HeatPoint};
use crate::api::premise::{CreatePremise, PremiseListResponse};
use crate::api::shift::{AssignShift, CreateShift, ShiftListResponse};
use crate::model::attendance::{AttendanceResponse, AttendanceStatus};
use crate::model::guard::{GuardProfile, GuardStatus};
use crate::model::patrol::PatrolCoordinate;
use crate::model::premise::{Premise, PremiseRef};
use crate::model::shift::ShiftResponse;
use crate::model::user::UserRef;
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Guard Roster API",
        version = "1.0.0",
        description = r#"
## Guard Workforce Management

Backend for a security company that staffs guards at client premises.

### Key Features
- **Shift Allocation**
  - Match guards to open shifts by skills, workload fairness and rest constraints
  - Allocate a whole premise-day, a date range, or a single guard from a badge scan
- **Attendance**
  - QR check-in with time-window and geofence checks
- **Patrols**
  - GPS breadcrumbs, latest positions and heatmap points
- **Dashboard**
  - Daily headline numbers and a seven-day trend

### Security
Every endpoint expects a **JWT Bearer** access token issued by the identity service.
Writes to the registry and allocation runs are limited to **Admin** and **Supervisor**.

### Times
Shift dates and times are wall-clock values in the configured site time zone.
"#,
    ),
    paths(
        crate::api::allocate::allocate,
        crate::api::allocate::allocate_day,
        crate::api::allocate::scan_guard,
        crate::api::allocate::recent_assignments,

        crate::api::attendance::check_in,
        crate::api::attendance::list_attendance,
        crate::api::attendance::history,
        crate::api::attendance::my_attendance,

        crate::api::patrol::create_patrol,
        crate::api::patrol::list_patrols,
        crate::api::patrol::latest_patrols,
        crate::api::patrol::shift_patrols,
        crate::api::patrol::heatmap,
        crate::api::patrol::active_guards,

        crate::api::dashboard::summary,
        crate::api::dashboard::analytics,

        crate::api::guard::list_guards,
        crate::api::guard::create_guard,
        crate::api::guard::get_guard,
        crate::api::guard::update_guard,
        crate::api::guard::delete_guard,
        crate::api::guard::guard_qr,

        crate::api::premise::list_premises,
        crate::api::premise::create_premise,
        crate::api::premise::get_premise,
        crate::api::premise::update_premise,
        crate::api::premise::delete_premise,
        crate::api::premise::premise_qr,

        crate::api::shift::list_shifts,
        crate::api::shift::create_shift,
        crate::api::shift::get_shift,
        crate::api::shift::update_shift,
        crate::api::shift::delete_shift,
        crate::api::shift::assign_shift
    ),
    components(
        schemas(
            AllocateRequest,
            AllocateResponse,
            AllocateDayRequest,
            Assignment,
            ScoreBreakdown,
            ScanGuardRequest,
            RecentAssignment,
            CheckInRequest,
            CheckInResponse,
            AttendanceResponse,
            AttendanceStatus,
            CreatePatrol,
            PatrolCoordinate,
            HeatPoint,
            ActiveGuard,
            DashboardSummary,
            DashboardAnalytics,
            DayAttendance,
            GuardWorkload,
            CreateGuard,
            UpdateGuard,
            GuardListResponse,
            GuardProfile,
            GuardStatus,
            CreatePremise,
            PremiseListResponse,
            Premise,
            PremiseRef,
            CreateShift,
            AssignShift,
            ShiftListResponse,
            ShiftResponse,
            UserRef
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Allocation", description = "Automatic and scan-driven shift allocation"),
        (name = "Attendance", description = "QR check-in and attendance history"),
        (name = "Patrols", description = "Patrol breadcrumbs and live positions"),
        (name = "Dashboard", description = "Operational summary and analytics"),
        (name = "Guards", description = "Guard profile registry"),
        (name = "Premises", description = "Client premise registry"),
        (name = "Shifts", description = "Shift registry and manual assignment"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
