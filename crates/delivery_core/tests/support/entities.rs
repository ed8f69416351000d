use delivery_core::ecs::{
    Courier, CourierId, Customer, CustomerId, Directory, Position, Restaurant, RestaurantId,
};
use delivery_core::environment::Environment;

pub fn courier(env: &Environment, id: CourierId) -> Courier {
    let entity = env
        .world()
        .resource::<Directory>()
        .courier(id)
        .expect("courier registered");
    *env.world().get::<Courier>(entity).expect("courier state")
}

pub fn courier_position(env: &Environment, id: CourierId) -> Position {
    let entity = env
        .world()
        .resource::<Directory>()
        .courier(id)
        .expect("courier registered");
    *env.world().get::<Position>(entity).expect("courier position")
}

pub fn restaurant(env: &Environment, id: RestaurantId) -> Restaurant {
    let entity = env
        .world()
        .resource::<Directory>()
        .restaurant(id)
        .expect("restaurant registered");
    *env.world().get::<Restaurant>(entity).expect("restaurant state")
}

pub fn customer(env: &Environment, id: CustomerId) -> Customer {
    let entity = env
        .world()
        .resource::<Directory>()
        .customer(id)
        .expect("customer registered");
    *env.world().get::<Customer>(entity).expect("customer state")
}
