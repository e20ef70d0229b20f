use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::handlers::{
    BookingResponse, ClientForm, FreeSpotsUpdate, NewPrice, PasswordChange, PriceUpdate,
    RegisterRequest,
};
use crate::models::{
    Attendance, ClassSession, Client, DayOfWeek, Employee, NewEmployee, NewSession, PriceEntry,
    Specialization, Trainer,
};

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "basic_auth",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Basic).build()),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz_live,
        crate::handlers::healthz_ready,
        crate::handlers::get_schedule,
        crate::handlers::get_schedule_ical,
        crate::handlers::create_session,
        crate::handlers::update_free_spots,
        crate::handlers::book_session,
        crate::handlers::register_client,
        crate::handlers::my_attendance,
        crate::handlers::change_password,
        crate::handlers::list_clients,
        crate::handlers::add_client,
        crate::handlers::update_client,
        crate::handlers::delete_client,
        crate::handlers::search_clients,
        crate::handlers::list_employees,
        crate::handlers::add_employee,
        crate::handlers::delete_employee,
        crate::handlers::search_employees,
        crate::handlers::list_trainers,
        crate::handlers::list_prices,
        crate::handlers::list_membership_types,
        crate::handlers::add_price,
        crate::handlers::update_price
    ),
    components(schemas(
        ClassSession,
        NewSession,
        DayOfWeek,
        Specialization,
        Client,
        Employee,
        NewEmployee,
        Trainer,
        PriceEntry,
        Attendance,
        BookingResponse,
        FreeSpotsUpdate,
        RegisterRequest,
        PasswordChange,
        ClientForm,
        NewPrice,
        PriceUpdate
    )),
    tags(
        (name = "studio", description = "Service information"),
        (name = "schedule", description = "Class schedule and booking"),
        (name = "clients", description = "Client accounts"),
        (name = "staff", description = "Trainers"),
        (name = "prices", description = "Membership prices")
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_booking_path() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/schedule/{id}/book"));
        assert!(doc.paths.paths.contains_key("/schedule"));
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("basic_auth"));
    }
}
