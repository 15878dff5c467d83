pub mod cart;
pub mod event;
pub mod order;
pub mod payment;
pub mod product;
pub mod reservation;
pub mod seat;
pub mod user;

pub use cart::{CartItem, CartItemInput, CartSnapshot, CheckoutSummary};
pub use event::Event;
pub use order::{order_total, Order, OrderItem, OrderStatus};
pub use payment::{Payment, PaymentStatus};
pub use product::Product;
pub use reservation::{HeldSeat, Reservation, ReservationStatus};
pub use seat::{PricedSeat, Seat, SeatAvailability, SeatListing, SeatTier};
pub use user::{MembershipTier, User};
