pub const FIRST_NAMES: &[&str] = &[
    "James", "Mary", "Robert", "Patricia", "John", "Jennifer", "Michael", "Linda", "David",
    "Elizabeth", "William", "Barbara", "Richard", "Susan", "Joseph", "Jessica", "Thomas", "Sarah",
    "Charles", "Karen", "Daniel", "Lisa", "Matthew", "Nancy", "Anthony", "Betty", "Mark",
    "Sandra", "Steven", "Ashley", "Andrew", "Emily", "Kenneth", "Donna", "Joshua", "Michelle",
    "Kevin", "Carol", "Brian", "Amanda", "George", "Melissa", "Timothy", "Deborah", "Priya",
    "Wei", "Aisha", "Mateo", "Sofia", "Kenji", "Olga", "Tariq", "Ingrid", "Diego",
];

pub const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez", "Hernandez", "Lopez", "Gonzalez", "Wilson", "Anderson", "Thomas", "Taylor",
    "Moore", "Jackson", "Martin", "Lee", "Perez", "Thompson", "White", "Harris", "Sanchez",
    "Clark", "Ramirez", "Lewis", "Robinson", "Walker", "Young", "Allen", "King", "Wright",
    "Scott", "Torres", "Nguyen", "Hill", "Flores", "Green", "Adams", "Nelson", "Baker",
    "Hall", "Rivera", "Campbell", "Mitchell", "Carter", "Roberts", "Chen", "Okafor", "Novak",
];

pub const COMPANY_WORDS: &[&str] = &[
    "Summit", "Harbor", "Cedar", "Pinnacle", "Northwind", "Bluestone", "Ironwood", "Meridian",
    "Crescent", "Redline", "Silverleaf", "Granite", "Lakeside", "Beacon", "Evergreen", "Atlas",
];

pub const COMPANY_SUFFIXES: &[&str] = &[
    "Group", "Holdings", "Partners", "Industries", "Systems", "Solutions", "and Sons", "LLC",
    "Inc", "Ltd",
];

/// (department, titles) pairs.
pub const DEPARTMENTS: &[(&str, &[&str])] = &[
    (
        "Engineering",
        &[
            "Software Engineer",
            "Senior Software Engineer",
            "Engineering Manager",
            "CTO",
            "DevOps Engineer",
        ],
    ),
    (
        "Marketing",
        &[
            "Marketing Specialist",
            "Marketing Manager",
            "CMO",
            "Content Creator",
        ],
    ),
    (
        "Sales",
        &["Sales Representative", "Account Manager", "VP of Sales"],
    ),
    (
        "Human Resources",
        &["HR Generalist", "HR Manager", "Recruiter"],
    ),
    ("Finance", &["Accountant", "Finance Director", "CFO"]),
    ("Legal", &["General Counsel", "Legal Assistant"]),
    (
        "Product",
        &["Product Manager", "Director of Product", "UX Designer"],
    ),
];
